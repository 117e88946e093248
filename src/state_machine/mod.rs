//! Generic step-driven state machine
//!
//! States are registered by id and carry three pieces of behavior scoped to
//! one context: an admission check ("is this transition legal from here"), an
//! entry action ("do the work"), and a compensation action ("undo the work").
//!
//! Keeping admission separate from entry lets a state double as a pure guard,
//! and attaching compensation per state keeps the number of undo actions
//! linear in states rather than transitions.
//!
//! The machine never mutates the context's recorded position: advancing the
//! domain state after a successful step is the caller's job, so the saga's
//! position stays explicit in the orchestrator.

pub mod machine;
pub mod state;

pub use machine::StateMachine;
pub use state::State;
