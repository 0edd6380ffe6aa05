//! HTTP surface.
//!
//! Thin handlers over the auth manager and agent engine: routes parse and
//! validate input, call one method, and map domain errors onto status
//! codes. No business logic lives here.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{AgentEngine, TurnError, TurnOutcome};
use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::error::{AuthError, LlmError};
use crate::llm::ChatMessage;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AgentEngine>,
    pub auth: Arc<AuthManager>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/oauth/login", get(oauth_login))
        .route("/oauth/callback", get(oauth_callback))
        .route("/oauth/status", get(oauth_status))
        .route("/chat", post(chat))
        .route("/agent", post(agent))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the task is cancelled.
pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Autoclerk listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn oauth_login(State(state): State<AppState>) -> Response {
    match state.auth.begin_authorization().await {
        Ok((auth_url, _)) => Json(serde_json::json!({ "auth_url": auth_url })).into_response(),
        Err(err) => auth_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    state: Option<String>,
    code: Option<String>,
    /// Set by the provider when the user denies consent.
    error: Option<String>,
}

async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        tracing::warn!(%error, "Authorization denied at the provider");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Authorization was not granted: {}", error)
            })),
        )
            .into_response();
    }

    let (returned_state, code) = match (params.state, params.code) {
        (Some(s), Some(c)) => (s, c),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "Callback is missing the state or code parameter"
                })),
            )
                .into_response();
        }
    };

    match state.auth.complete_authorization(&returned_state, &code).await {
        Ok(_) => Html(SUCCESS_PAGE).into_response(),
        Err(err) => auth_error_response(err),
    }
}

async fn oauth_status(State(state): State<AppState>) -> Response {
    let status = state.auth.status().await;
    if status.authenticated {
        return Json(serde_json::json!(status)).into_response();
    }

    // Unauthenticated: attach a fresh authorization URL so a client can
    // send the user straight into the flow.
    let auth_url = match state.auth.begin_authorization().await {
        Ok((url, _)) => Some(url),
        Err(err) => {
            tracing::warn!(error = %err, "Could not build an authorization URL");
            None
        }
    };
    Json(serde_json::json!({
        "authenticated": false,
        "auth_url": auth_url,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct PromptRequest {
    prompt: String,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct PromptResponse {
    response: String,
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<PromptRequest>,
) -> Response {
    if req.prompt.trim().is_empty() {
        return empty_prompt_response();
    }

    match state.engine.chat(&req.prompt, &req.history).await {
        Ok(response) => Json(PromptResponse { response }).into_response(),
        Err(err) => llm_error_response(err),
    }
}

async fn agent(
    State(state): State<AppState>,
    Json(req): Json<PromptRequest>,
) -> Response {
    if req.prompt.trim().is_empty() {
        return empty_prompt_response();
    }

    match state.engine.run_turn(&req.prompt, &req.history).await {
        Ok(TurnOutcome::FinalAnswer(response)) => {
            Json(PromptResponse { response }).into_response()
        }
        Ok(TurnOutcome::AuthorizationRequired { auth_url }) => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "requires_auth": true,
                "auth_url": auth_url,
            })),
        )
            .into_response(),
        Err(TurnError::Auth(err)) => auth_error_response(err),
        Err(TurnError::Llm(err)) => llm_error_response(err),
    }
}

fn empty_prompt_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": "prompt must not be empty" })),
    )
        .into_response()
}

fn auth_error_response(err: AuthError) -> Response {
    let status = match &err {
        AuthError::StateMismatch | AuthError::StateExpired => StatusCode::BAD_REQUEST,
        AuthError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Exchange(_) => StatusCode::BAD_GATEWAY,
        AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::BAD_REQUEST {
        tracing::warn!(error = %err, "Rejected authorization callback");
    }
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

fn llm_error_response(err: LlmError) -> Response {
    let status = match &err {
        LlmError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        LlmError::AuthFailed { .. } => StatusCode::BAD_GATEWAY,
        LlmError::RequestFailed { .. } | LlmError::InvalidResponse { .. } => {
            StatusCode::BAD_GATEWAY
        }
    };
    tracing::error!(error = %err, "Model request failed");
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

const SUCCESS_PAGE: &str = "<!DOCTYPE html>\
<html><head><title>Autoclerk</title></head>\
<body style=\"font-family: sans-serif; text-align: center; margin-top: 4em;\">\
<h1>Authorization complete</h1>\
<p>Autoclerk can now act on your Google account. You can close this tab.</p>\
</body></html>";

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use secrecy::SecretString;

    use crate::auth::{AuthorizationRecord, CredentialStore};
    use crate::config::GoogleOauthConfig;
    use crate::llm::{
        CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
        ToolCompletionRequest, ToolCompletionResponse,
    };
    use crate::tools::{Dispatcher, ToolRegistry, Tool, ToolContext, ToolError, ToolOutput};

    struct CannedProvider {
        answer: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(
            &self,
            _req: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompletionResponse {
                content: self.answer.to_string(),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn complete_with_tools(
            &self,
            _req: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolCompletionResponse {
                content: Some(self.answer.to_string()),
                tool_calls: Vec::new(),
                finish_reason: FinishReason::Stop,
            })
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    struct NoopTool;

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }
        fn description(&self) -> &str {
            "Does nothing."
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(
            &self,
            _params: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text("ok", std::time::Duration::from_millis(1)))
        }
    }

    fn oauth_config(dir: &std::path::Path) -> GoogleOauthConfig {
        GoogleOauthConfig {
            client_id: Some("client".to_string()),
            client_secret: Some(SecretString::from("secret")),
            redirect_uri: "http://127.0.0.1:8000/oauth/callback".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/documents".to_string()],
            auth_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_endpoint: "http://127.0.0.1:1/token".to_string(),
            token_path: dir.join("token.json"),
        }
    }

    async fn spawn_app(dir: &std::path::Path, authenticated: bool) -> String {
        let config = oauth_config(dir);
        if authenticated {
            let store = CredentialStore::new(config.token_path.clone());
            store
                .save(&AuthorizationRecord {
                    access_token: SecretString::from("live"),
                    refresh_token: None,
                    expires_at: Utc::now() + chrono::Duration::hours(1),
                    granted_scopes: Default::default(),
                })
                .await
                .unwrap();
        }
        let auth = Arc::new(AuthManager::new(config));
        let provider = Arc::new(CannedProvider {
            answer: "canned answer",
            calls: AtomicUsize::new(0),
        });
        let registry = Arc::new(ToolRegistry::new(vec![Arc::new(NoopTool)]).unwrap());
        let dispatcher = Arc::new(Dispatcher::new(registry, auth.clone()));
        let engine = Arc::new(AgentEngine::new(provider, dispatcher, auth.clone()));

        let app = router(AppState { engine, auth });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), false).await;

        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_oauth_login_returns_auth_url() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), false).await;

        let body: serde_json::Value = reqwest::get(format!("{}/oauth/login", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let url = body["auth_url"].as_str().unwrap();
        assert!(url.starts_with("https://accounts.google.com/"));
        assert!(url.contains("state="));
    }

    #[tokio::test]
    async fn test_callback_with_mismatched_state_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), false).await;

        // Arm a pending authorization, then return a forged state.
        reqwest::get(format!("{}/oauth/login", base)).await.unwrap();
        let resp = reqwest::get(format!(
            "{}/oauth/callback?state=forged&code=abc",
            base
        ))
        .await
        .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        // The body warns the user the request may be forged.
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("forged"));
    }

    #[tokio::test]
    async fn test_callback_without_pending_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), false).await;

        let resp = reqwest::get(format!("{}/oauth/callback?state=x&code=y", base))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_with_provider_error_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), false).await;

        let resp = reqwest::get(format!("{}/oauth/callback?error=access_denied", base))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("access_denied"));
    }

    #[tokio::test]
    async fn test_status_unauthenticated_includes_auth_url() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), false).await;

        let body: serde_json::Value = reqwest::get(format!("{}/oauth/status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["authenticated"], false);
        assert!(body["auth_url"].as_str().unwrap().contains("state="));
    }

    #[tokio::test]
    async fn test_status_authenticated() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), true).await;

        let body: serde_json::Value = reqwest::get(format!("{}/oauth/status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["authenticated"], true);
        assert!(body.get("auth_url").is_none());
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), false).await;

        let client = reqwest::Client::new();
        let body: serde_json::Value = client
            .post(format!("{}/chat", base))
            .json(&serde_json::json!({ "prompt": "hello" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["response"], "canned answer");
    }

    #[tokio::test]
    async fn test_agent_requires_auth_when_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), false).await;

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/agent", base))
            .json(&serde_json::json!({ "prompt": "make me a doc" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["requires_auth"], true);
        assert!(body["auth_url"].as_str().unwrap().contains("state="));
    }

    #[tokio::test]
    async fn test_agent_answers_when_authenticated() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), true).await;

        let client = reqwest::Client::new();
        let body: serde_json::Value = client
            .post(format!("{}/agent", base))
            .json(&serde_json::json!({ "prompt": "hello" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["response"], "canned answer");
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let base = spawn_app(dir.path(), true).await;

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/agent", base))
            .json(&serde_json::json!({ "prompt": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }
}
