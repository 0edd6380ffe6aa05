//! OAuth2 authorization-code lifecycle.
//!
//! Drives the whole flow: issues state-bound authorization URLs, verifies
//! the callback, exchanges the code for tokens, and refreshes expired
//! access tokens before any capability call. The pending state and the
//! stored record are the only process-wide mutable auth state; both sit
//! behind mutexes so concurrent turns cannot race an exchange or trigger
//! duplicate refreshes.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use crate::auth::store::{AuthorizationRecord, CredentialStore};
use crate::config::GoogleOauthConfig;
use crate::error::AuthError;

/// Refresh proactively when less than this many seconds remain.
const REFRESH_MARGIN_SECS: i64 = 60;

/// A pending authorization URL is honored for this long.
const PENDING_STATE_TTL_SECS: i64 = 600;

/// Anti-forgery state waiting for its callback.
#[derive(Debug)]
struct PendingAuthorization {
    state: String,
    issued_at: DateTime<Utc>,
}

/// Read-only authentication snapshot. Never triggers network calls.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Wire shape of Google's token endpoint responses.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
}

/// Manages the delegated authorization lifecycle for the single local user.
pub struct AuthManager {
    config: GoogleOauthConfig,
    store: CredentialStore,
    client: Client,
    /// Most recently issued, unconsumed state. Single slot: issuing a new
    /// authorization URL invalidates the previous one.
    pending: Mutex<Option<PendingAuthorization>>,
    /// At most one refresh in flight; late arrivals re-read the store.
    refresh_lock: Mutex<()>,
}

impl AuthManager {
    pub fn new(config: GoogleOauthConfig) -> Self {
        let store = CredentialStore::new(config.token_path.clone());
        Self {
            config,
            store,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            pending: Mutex::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    fn client_credentials(&self) -> Result<(&str, &SecretString), AuthError> {
        let id = self.config.client_id.as_deref().ok_or_else(|| {
            AuthError::Configuration("GOOGLE_CLIENT_ID is not set".to_string())
        })?;
        let secret = self.config.client_secret.as_ref().ok_or_else(|| {
            AuthError::Configuration("GOOGLE_CLIENT_SECRET is not set".to_string())
        })?;
        Ok((id, secret))
    }

    /// Issue a fresh authorization URL bound to a one-time state token.
    ///
    /// Returns `(authorization_url, state)`. The state is stored as pending
    /// and consumed by the first callback attempt.
    pub async fn begin_authorization(&self) -> Result<(String, String), AuthError> {
        let (client_id, _) = self.client_credentials()?;

        let state = generate_state_token();
        let url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline&prompt=consent",
            self.config.auth_endpoint,
            urlencoding::encode(client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scopes.join(" ")),
            urlencoding::encode(&state),
        );

        *self.pending.lock().await = Some(PendingAuthorization {
            state: state.clone(),
            issued_at: Utc::now(),
        });

        tracing::info!("Issued authorization URL");
        Ok((url, state))
    }

    /// Verify the callback and exchange the code for tokens.
    ///
    /// The pending state is consumed on the first attempt regardless of
    /// outcome, so neither a mismatched nor a successful callback can be
    /// replayed.
    pub async fn complete_authorization(
        &self,
        returned_state: &str,
        code: &str,
    ) -> Result<AuthorizationRecord, AuthError> {
        let pending = self
            .pending
            .lock()
            .await
            .take()
            .ok_or(AuthError::StateExpired)?;

        if Utc::now() - pending.issued_at > Duration::seconds(PENDING_STATE_TTL_SECS) {
            tracing::warn!("Authorization callback arrived after the pending state expired");
            return Err(AuthError::StateExpired);
        }

        let matches: bool = pending
            .state
            .as_bytes()
            .ct_eq(returned_state.as_bytes())
            .into();
        if !matches {
            tracing::warn!("Authorization callback state mismatch, rejecting");
            return Err(AuthError::StateMismatch);
        }

        let (client_id, client_secret) = self.client_credentials()?;
        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret.expose_secret()),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Exchange(format!("token request failed: {}", e)))?;

        let token = read_token_response(response).await?;
        let record = self.record_from_token(token, None);
        self.store.save(&record).await?;

        tracing::info!(
            scopes = record.granted_scopes.len(),
            "Authorization complete, credentials stored"
        );
        Ok(record)
    }

    /// Return live credentials, refreshing first when the access token is
    /// within the safety margin of expiry.
    ///
    /// `None` means re-authorization is required; refresh failures delete
    /// the stored record rather than erroring, because restarting the flow
    /// is the expected remediation.
    pub async fn current_credentials(&self) -> Option<AuthorizationRecord> {
        let record = match self.store.load().await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Discarding unreadable credential record: {}", e);
                let _ = self.store.delete().await;
                return None;
            }
        };

        if !record.expires_within(Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Some(record);
        }

        if record.refresh_token.is_none() {
            tracing::info!("Access token expired with no refresh token, re-authorization required");
            let _ = self.store.delete().await;
            return None;
        }

        // Single-flight: a second caller that observed the expired token
        // waits here, then re-reads instead of duplicating the refresh.
        let _guard = self.refresh_lock.lock().await;
        let record = match self.store.load().await {
            Ok(Some(record)) => record,
            _ => return None,
        };
        if !record.expires_within(Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Some(record);
        }

        match self.refresh(&record).await {
            Ok(refreshed) => {
                if let Err(e) = self.store.save(&refreshed).await {
                    tracing::warn!("Failed to persist refreshed credentials: {}", e);
                }
                Some(refreshed)
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, clearing credentials: {}", e);
                let _ = self.store.delete().await;
                None
            }
        }
    }

    /// Read-only introspection of the stored record.
    pub async fn status(&self) -> AuthStatus {
        let record = match self.store.load().await {
            Ok(Some(record)) => record,
            _ => {
                return AuthStatus {
                    authenticated: false,
                    scopes: Vec::new(),
                    expires_at: None,
                };
            }
        };

        let expired = record.expires_within(Duration::zero());
        let renewable = record.refresh_token.is_some();

        AuthStatus {
            authenticated: !expired || renewable,
            scopes: record.granted_scopes.iter().cloned().collect(),
            expires_at: Some(record.expires_at),
        }
    }

    async fn refresh(&self, record: &AuthorizationRecord) -> Result<AuthorizationRecord, AuthError> {
        let (client_id, client_secret) = self.client_credentials()?;
        let refresh_token = record
            .refresh_token
            .as_ref()
            .ok_or_else(|| AuthError::Exchange("no refresh token".to_string()))?;

        tracing::debug!("Refreshing access token");
        let response = self
            .client
            .post(&self.config.token_endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
                ("client_id", client_id),
                ("client_secret", client_secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Exchange(format!("refresh request failed: {}", e)))?;

        let token = read_token_response(response).await?;
        Ok(self.record_from_token(token, Some(record)))
    }

    /// Build a record from a token response. `previous` carries forward the
    /// refresh token and scopes when the provider omits them (Google does
    /// not re-send the refresh token on refresh).
    fn record_from_token(
        &self,
        token: TokenResponse,
        previous: Option<&AuthorizationRecord>,
    ) -> AuthorizationRecord {
        let granted_scopes: BTreeSet<String> = match token.scope {
            Some(scope) if !scope.is_empty() => {
                scope.split_whitespace().map(String::from).collect()
            }
            _ => match previous {
                Some(prev) => prev.granted_scopes.clone(),
                None => self.config.scopes.iter().cloned().collect(),
            },
        };

        AuthorizationRecord {
            access_token: SecretString::from(token.access_token),
            refresh_token: token
                .refresh_token
                .map(SecretString::from)
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            granted_scopes,
        }
    }

    #[cfg(test)]
    async fn backdate_pending(&self, age_secs: i64) {
        if let Some(pending) = self.pending.lock().await.as_mut() {
            pending.issued_at = Utc::now() - Duration::seconds(age_secs);
        }
    }
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse, AuthError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(AuthError::Exchange(format!("HTTP {}: {}", status, body)));
    }

    serde_json::from_str(&body)
        .map_err(|e| AuthError::Exchange(format!("invalid token response: {}", e)))
}

/// Cryptographically random state token (32 bytes, hex-encoded).
fn generate_state_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
