//! Core agent logic: one conversation turn at a time.

mod engine;

pub use engine::{AgentEngine, TurnError, TurnOutcome, MAX_TOOL_ITERATIONS};
