//! Environment-backed configuration.
//!
//! Loaded once at startup (after `dotenvy` has populated the environment).
//! Secrets are wrapped in `SecretString` so they never appear in debug
//! output or logs.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Top-level configuration for the backend.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub google: GoogleOauthConfig,
    pub llm: LlmConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Google OAuth2 client settings.
///
/// `client_id`/`client_secret` may be absent at startup; the server still
/// runs, and `begin_authorization` reports the gap when the flow is used.
#[derive(Debug, Clone)]
pub struct GoogleOauthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    /// Redirect URI registered with the OAuth client.
    pub redirect_uri: String,
    /// Scopes requested on authorization.
    pub scopes: Vec<String>,
    /// Authorization endpoint.
    pub auth_endpoint: String,
    /// Token exchange/refresh endpoint.
    pub token_endpoint: String,
    /// Path of the single-slot credential file.
    pub token_path: PathBuf,
}

/// Language-model provider settings (Groq chat completions).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
}

/// Scopes covering every capability the agent exposes.
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.readonly",
];

impl Config {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("AUTOCLERK_PORT") {
            Ok(v) => v.parse::<u16>().map_err(|e| ConfigError::InvalidVar {
                var: "AUTOCLERK_PORT".to_string(),
                reason: e.to_string(),
            })?,
            Err(_) => 8000,
        };

        let server = ServerConfig {
            host: std::env::var("AUTOCLERK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
        };

        let redirect_uri = std::env::var("GOOGLE_REDIRECT_URI")
            .unwrap_or_else(|_| format!("http://{}:{}/oauth/callback", server.host, server.port));

        let scopes = match std::env::var("GOOGLE_OAUTH_SCOPES") {
            Ok(v) => v.split_whitespace().map(String::from).collect(),
            Err(_) => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let google = GoogleOauthConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET")
                .ok()
                .filter(|v| !v.is_empty())
                .map(SecretString::from),
            redirect_uri,
            scopes,
            auth_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            token_path: std::env::var("AUTOCLERK_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_token_path()),
        };

        let llm = LlmConfig {
            api_key: std::env::var("GROQ_API_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .map(SecretString::from),
            base_url: std::env::var("GROQ_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            model: std::env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "openai/gpt-oss-20b".to_string()),
        };

        Ok(Self { server, google, llm })
    }
}

/// Default credential file path (~/.autoclerk/token.json).
pub fn default_token_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".autoclerk")
        .join("token.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_token_path() {
        let path = default_token_path();
        assert!(path.ends_with("token.json"));
        assert!(path.to_string_lossy().contains(".autoclerk"));
    }

    #[test]
    fn test_default_scopes_cover_services() {
        let joined = DEFAULT_SCOPES.join(" ");
        assert!(joined.contains("documents"));
        assert!(joined.contains("spreadsheets"));
        assert!(joined.contains("gmail"));
    }
}
