//! Tool-call dispatch.
//!
//! Maps a model-issued tool call to a registered capability, validates the
//! arguments against the capability's schema before anything external runs,
//! executes it with live credentials, and normalizes every outcome into a
//! `ToolResult`. Side-effecting calls are never retried here; rate limits
//! and transient failures are surfaced for the model to decide.

use std::sync::Arc;

use serde::Serialize;

use crate::auth::AuthManager;
use crate::llm::ToolCall;
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::{ToolContext, ToolError};

/// Classification of a tool-call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownCapability,
    InvalidArguments,
    AuthorizationLost,
    PermissionDenied,
    NotFound,
    RateLimited,
    Transient,
    ExecutionFailed,
}

/// Outcome of one dispatched tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { result: serde_json::Value },
    Failure { kind: FailureKind, message: String },
}

/// A normalized tool result, correlated to its originating call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    fn failure(call: &ToolCall, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            outcome: ToolOutcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Failure { .. })
    }

    /// Render the outcome as the content of a tool message.
    pub fn to_message_content(&self) -> String {
        serde_json::to_string(&self.outcome)
            .unwrap_or_else(|_| "{\"status\":\"failure\",\"kind\":\"execution_failed\"}".to_string())
    }
}

fn classify(err: ToolError) -> (FailureKind, String) {
    let message = err.to_string();
    let kind = match err {
        ToolError::InvalidParameters(_) => FailureKind::InvalidArguments,
        ToolError::PermissionDenied(_) => FailureKind::PermissionDenied,
        ToolError::AuthorizationLost(_) => FailureKind::AuthorizationLost,
        ToolError::NotFound(_) => FailureKind::NotFound,
        ToolError::RateLimited(_) => FailureKind::RateLimited,
        ToolError::Timeout(_) | ToolError::ExternalService(_) => FailureKind::Transient,
        ToolError::ExecutionFailed(_) => FailureKind::ExecutionFailed,
    };
    (kind, message)
}

/// Executes tool calls against the registry.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    auth: Arc<AuthManager>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, auth: Arc<AuthManager>) -> Self {
        Self { registry, auth }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one tool call and normalize the outcome.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let tool = match self.registry.get(&call.name) {
            Some(tool) => tool,
            None => {
                tracing::warn!(tool = %call.name, "Unknown capability requested");
                return ToolResult::failure(
                    call,
                    FailureKind::UnknownCapability,
                    format!("no capability named '{}'", call.name),
                );
            }
        };

        if let Err(reason) = validate_arguments(&tool.parameters_schema(), &call.arguments) {
            // Fail fast: the external call is never made on bad arguments.
            return ToolResult::failure(call, FailureKind::InvalidArguments, reason);
        }

        let credentials = match self.auth.current_credentials().await {
            Some(record) => record,
            None => {
                return ToolResult::failure(
                    call,
                    FailureKind::AuthorizationLost,
                    "credentials are missing or could not be refreshed; re-authorization required",
                );
            }
        };

        let ctx = ToolContext::new(credentials.access_token);
        match tool.execute(call.arguments.clone(), &ctx).await {
            Ok(output) => {
                tracing::debug!(tool = %call.name, duration = ?output.duration, "Tool call succeeded");
                ToolResult {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    outcome: ToolOutcome::Success {
                        result: output.result,
                    },
                }
            }
            Err(err) => {
                let (kind, message) = classify(err);
                tracing::warn!(tool = %call.name, kind = ?kind, "Tool call failed: {}", message);
                ToolResult::failure(call, kind, message)
            }
        }
    }
}

/// Validate arguments against a JSON-Schema object: required fields must be
/// present, and declared primitive types must match.
pub fn validate_arguments(
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> Result<(), String> {
    let args = arguments
        .as_object()
        .ok_or_else(|| "arguments must be a JSON object".to_string())?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            match args.get(field) {
                None | Some(serde_json::Value::Null) => {
                    return Err(format!("missing required argument '{}'", field));
                }
                Some(_) => {}
            }
        }
    }

    let properties = match schema.get("properties").and_then(|p| p.as_object()) {
        Some(props) => props,
        None => return Ok(()),
    };

    for (name, value) in args {
        let Some(declared) = properties.get(name).and_then(|p| p.get("type")) else {
            continue;
        };
        let Some(expected) = declared.as_str() else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let matches = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        };
        if !matches {
            return Err(format!(
                "argument '{}' must be of type {}",
                name, expected
            ));
        }
    }

    Ok(())
}
