//! Shared Google REST client.
//!
//! Every capability goes through this client: bearer-token injection,
//! JSON encoding, and classification of HTTP failures into the tool error
//! taxonomy. A 401 means the token died between the dispatcher's credential
//! check and the call, which the dispatcher surfaces as authorization lost.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::tools::tool::{ToolContext, ToolError};

pub const DOCS_API_BASE: &str = "https://docs.googleapis.com/v1";
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

#[derive(Clone)]
pub struct GoogleClient {
    client: Client,
}

impl GoogleClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    pub async fn get(
        &self,
        url: &str,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        self.request::<()>(Method::GET, url, None, ctx).await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        self.request(Method::POST, url, Some(body), ctx).await
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        self.request(Method::PUT, url, Some(body), ctx).await
    }

    async fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&T>,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        tracing::debug!("Google API: {} {}", method, url);

        let mut request = self.client.request(method, url).header(
            "Authorization",
            format!("Bearer {}", ctx.access_token.expose_secret()),
        );
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout(Duration::from_secs(30))
            } else {
                ToolError::ExternalService(e.to_string())
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(classify_status(status, retry_after, &text));
        }

        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            ToolError::ExternalService(format!("invalid JSON from Google API: {}", e))
        })
    }
}

impl Default for GoogleClient {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ToolError {
    let detail = api_error_message(body).unwrap_or_else(|| truncate(body, 300));
    match status.as_u16() {
        401 => ToolError::AuthorizationLost(format!("access token rejected: {}", detail)),
        403 => ToolError::PermissionDenied(detail),
        404 => ToolError::NotFound(detail),
        429 => ToolError::RateLimited(retry_after),
        500..=599 => ToolError::ExternalService(format!("HTTP {}: {}", status, detail)),
        _ => ToolError::ExecutionFailed(format!("HTTP {}: {}", status, detail)),
    }
}

/// Pull the human-readable message out of a Google API error envelope.
fn api_error_message(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    parsed["error"]["message"].as_str().map(String::from)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    // Back off to a char boundary so multibyte text never panics the slice.
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Percent-encode one path segment (document and spreadsheet ids, ranges).
pub fn encode_segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, "{}"),
            ToolError::AuthorizationLost(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, "{}"),
            ToolError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None, "{}"),
            ToolError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(
                StatusCode::TOO_MANY_REQUESTS,
                Some(Duration::from_secs(7)),
                "{}"
            ),
            ToolError::RateLimited(Some(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, "{}"),
            ToolError::ExternalService(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, "{}"),
            ToolError::ExecutionFailed(_)
        ));
    }

    #[test]
    fn test_classify_truncates_multibyte_bodies_on_char_boundary() {
        // Non-JSON error body where a multibyte char straddles the cutoff.
        let body = format!("{}é…", "x".repeat(299));
        let err = classify_status(StatusCode::BAD_REQUEST, None, &body);
        match err {
            ToolError::ExecutionFailed(msg) => {
                assert!(msg.contains("HTTP 400"));
                assert!(msg.ends_with("..."));
            }
            _ => panic!("expected ExecutionFailed"),
        }
    }

    #[test]
    fn test_api_error_message_extraction() {
        let body = r#"{"error": {"code": 403, "message": "The caller does not have permission"}}"#;
        assert_eq!(
            api_error_message(body).unwrap(),
            "The caller does not have permission"
        );
        assert!(api_error_message("not json").is_none());
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("Sheet1!A1:D10"), "Sheet1%21A1%3AD10");
    }
}
