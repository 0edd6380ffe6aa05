//! Capability system.
//!
//! Tools are the agent's interface to Google Workspace. The registry holds
//! the fixed capability set; the dispatcher validates and executes
//! model-issued tool calls and normalizes every outcome.

pub mod google;

mod dispatcher;
mod registry;
mod tool;

pub use dispatcher::{Dispatcher, FailureKind, ToolOutcome, ToolResult};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolContext, ToolError, ToolOutput, ToolSchema};
