//! Language-model integration.
//!
//! The provider is treated as a black-box completion/tool-call service
//! behind the `LlmProvider` trait; Groq's OpenAI-compatible chat
//! completions endpoint is the concrete implementation.

mod groq;
mod provider;

pub use groq::GroqProvider;
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role, ToolCall,
    ToolCompletionRequest, ToolCompletionResponse, ToolDefinition,
};
