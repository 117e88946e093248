use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::fee::{default_maker_rate, default_taker_rate};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    #[serde(default)]
    pub fees: FeeConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConsumerConfig {
    /// Capacity of the inbound trade-match channel
    pub queue_size: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self { queue_size: 1024 }
    }
}

/// Retry + circuit breaker knobs for the per-step resilience wrapper.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResilienceConfig {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Backoff before retry n is `backoff_base_secs * 2^n` seconds
    pub backoff_base_secs: u64,
    /// Consecutive faults before the breaker opens
    pub breaker_failure_threshold: u32,
    /// How long an open breaker fails fast before allowing a probe
    pub breaker_cooldown_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_secs: 1,
            breaker_failure_threshold: 2,
            breaker_cooldown_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FeeConfig {
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            maker_rate: default_maker_rate(),
            taker_rate: default_taker_rate(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", config_path, e))?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
            log_file: "settlement-core.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            enable_tracing: true,
            consumer: ConsumerConfig::default(),
            resilience: ResilienceConfig::default(),
            fees: FeeConfig::default(),
        }
    }
}
