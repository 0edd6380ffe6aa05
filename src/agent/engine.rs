//! The conversation-turn loop.
//!
//! One `run_turn` owns one turn: it checks authorization once up front,
//! then alternates between model calls and tool dispatch until the model
//! yields a final answer or the iteration cap is reached. Tool failures are
//! fed back into the conversation as structured results so the model can
//! adapt; nothing short of a provider outage aborts the turn.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::AuthManager;
use crate::error::{AuthError, LlmError};
use crate::llm::{
    ChatMessage, CompletionRequest, LlmProvider, ToolCompletionRequest,
};
use crate::tools::Dispatcher;

/// Hard upper bound on model/tool round trips within one turn.
pub const MAX_TOOL_ITERATIONS: usize = 8;

const SYSTEM_PROMPT: &str = "You are Autoclerk, a friendly AI assistant specialized in finance \
and office automation. You can create and edit Google Docs and Sheets, search the user's \
Drive, and send or search Gmail on their behalf using the available tools. Use tools when \
the user asks for a document, spreadsheet, or email action; otherwise answer directly. \
When a tool fails, explain the failure to the user instead of retrying endlessly.";

/// Result of one agent turn.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The model produced a final answer (possibly synthesized at the cap).
    FinalAnswer(String),
    /// No usable credentials; the user must visit the authorization URL.
    AuthorizationRequired { auth_url: String },
}

/// Errors that abort a turn outright.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

pub struct AgentEngine {
    provider: Arc<dyn LlmProvider>,
    dispatcher: Arc<Dispatcher>,
    auth: Arc<AuthManager>,
}

impl AgentEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        dispatcher: Arc<Dispatcher>,
        auth: Arc<AuthManager>,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            auth,
        }
    }

    /// Plain model passthrough: no tools, no authorization requirement.
    pub async fn chat(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(prompt));

        let response = self
            .provider
            .complete(CompletionRequest {
                messages,
                temperature: None,
                max_tokens: None,
            })
            .await?;

        Ok(response.content)
    }

    /// Run one tool-capable conversation turn.
    pub async fn run_turn(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<TurnOutcome, TurnError> {
        // Authorization gate before any model call: a turn that cannot
        // dispatch tools should not burn an LLM invocation.
        if self.auth.current_credentials().await.is_none() {
            let (auth_url, _) = self.auth.begin_authorization().await?;
            tracing::info!("Agent turn short-circuited: authorization required");
            return Ok(TurnOutcome::AuthorizationRequired { auth_url });
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(prompt));

        let tools = self.dispatcher.registry().definitions();

        for iteration in 1..=MAX_TOOL_ITERATIONS {
            let response = self
                .provider
                .complete_with_tools(ToolCompletionRequest {
                    messages: messages.clone(),
                    tools: tools.clone(),
                    temperature: None,
                    max_tokens: None,
                })
                .await?;

            if response.tool_calls.is_empty() {
                let answer = response.content.unwrap_or_default();
                let answer = if answer.trim().is_empty() {
                    "Task completed successfully. The requested operation was performed."
                        .to_string()
                } else {
                    answer
                };
                tracing::debug!(iteration, "Agent turn finished with a final answer");
                return Ok(TurnOutcome::FinalAnswer(answer));
            }

            tracing::debug!(
                iteration,
                calls = response.tool_calls.len(),
                "Model requested tool calls"
            );
            messages.push(ChatMessage::assistant_tool_calls(
                response.tool_calls.clone(),
            ));

            // Sequential, in request order: later calls may build on
            // earlier results through the conversation.
            for call in &response.tool_calls {
                let result = self.dispatcher.execute(call).await;
                messages.push(ChatMessage::tool_result(
                    result.call_id.clone(),
                    result.to_message_content(),
                ));
            }
        }

        tracing::warn!(
            cap = MAX_TOOL_ITERATIONS,
            "Agent turn hit the iteration cap without a final answer"
        );
        Ok(TurnOutcome::FinalAnswer(format!(
            "I wasn't able to complete this request within {} tool steps. \
             Partial progress may have been made; please check the affected \
             documents or try a more specific request.",
            MAX_TOOL_ITERATIONS
        )))
    }
}
