//! Error types shared across the crate.
//!
//! Each domain gets its own enum. Only `ConfigError` is fatal; everything
//! else is recovered into an HTTP response or a tool-result failure.

use thiserror::Error;

/// Fatal startup errors: missing credentials, malformed tool registration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidVar { var: String, reason: String },

    #[error("Tool registration failed: {0}")]
    ToolRegistration(String),
}

/// Errors from the OAuth2 authorization lifecycle.
///
/// None of these are fatal to the process; handlers turn them into 4xx/5xx
/// responses and the user restarts the flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("OAuth client credentials are not configured: {0}")]
    Configuration(String),

    #[error("Authorization state mismatch: the callback did not match the pending request and may be a forged (cross-site) request; restart the authorization flow")]
    StateMismatch,

    #[error("No authorization is pending (state expired or already consumed)")]
    StateExpired,

    #[error("Token exchange rejected by provider: {0}")]
    Exchange(String),

    #[error("Credential storage failed: {0}")]
    Storage(String),
}

/// Errors from the language-model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Request to {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Rate limited by {provider} (retry after {retry_after:?})")]
    RateLimited {
        provider: String,
        retry_after: Option<std::time::Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}
