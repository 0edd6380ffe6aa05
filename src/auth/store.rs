//! Single-slot credential persistence.
//!
//! One `AuthorizationRecord` per installation, stored as JSON at the
//! configured token path and overwritten wholesale on refresh or re-auth.
//! The store never decides anything about token validity; that is the
//! manager's job. All mutation goes through `AuthManager`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// The persisted authorization record.
///
/// If `refresh_token` is absent the record is non-renewable and must be
/// discarded once `expires_at` has passed.
#[derive(Debug, Clone)]
pub struct AuthorizationRecord {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: DateTime<Utc>,
    pub granted_scopes: BTreeSet<String>,
}

impl AuthorizationRecord {
    /// Whether the access token expires within `margin` from now.
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        self.expires_at - Utc::now() <= margin
    }
}

/// On-disk shape of the record. Kept separate so the in-memory type can use
/// `SecretString` without leaking through Debug/Serialize.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
    granted_scopes: BTreeSet<String>,
}

impl From<&AuthorizationRecord> for StoredRecord {
    fn from(record: &AuthorizationRecord) -> Self {
        Self {
            access_token: record.access_token.expose_secret().to_string(),
            refresh_token: record
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            expires_at: record.expires_at,
            granted_scopes: record.granted_scopes.clone(),
        }
    }
}

impl From<StoredRecord> for AuthorizationRecord {
    fn from(stored: StoredRecord) -> Self {
        Self {
            access_token: SecretString::from(stored.access_token),
            refresh_token: stored.refresh_token.map(SecretString::from),
            expires_at: stored.expires_at,
            granted_scopes: stored.granted_scopes,
        }
    }
}

/// File-backed single-slot store.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the stored record, if any. A missing file is `None`; a corrupt
    /// file is an error so the caller can decide to discard it.
    pub async fn load(&self) -> Result<Option<AuthorizationRecord>, AuthError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::Storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let stored: StoredRecord = serde_json::from_str(&data)
            .map_err(|e| AuthError::Storage(format!("failed to parse credential file: {}", e)))?;

        Ok(Some(stored.into()))
    }

    /// Persist a record, replacing whatever was there.
    pub async fn save(&self, record: &AuthorizationRecord) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AuthError::Storage(format!("failed to create credential directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&StoredRecord::from(record))
            .map_err(|e| AuthError::Storage(format!("failed to serialize record: {}", e)))?;

        tokio::fs::write(&self.path, json).await.map_err(|e| {
            AuthError::Storage(format!(
                "failed to write {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!("Credentials saved to {}", self.path.display());
        Ok(())
    }

    /// Delete the stored record. Missing file is not an error.
    pub async fn delete(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!("Credentials deleted from {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(format!(
                "failed to delete {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> AuthorizationRecord {
        AuthorizationRecord {
            access_token: SecretString::from("access-123"),
            refresh_token: Some(SecretString::from("refresh-456")),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            granted_scopes: ["https://www.googleapis.com/auth/documents"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("token.json"));

        assert!(store.load().await.unwrap().is_none());

        let record = sample_record();
        store.save(&record).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token.expose_secret(), "access-123");
        assert_eq!(
            loaded.refresh_token.unwrap().expose_secret(),
            "refresh-456"
        );
        assert_eq!(loaded.granted_scopes, record.granted_scopes);
    }

    #[tokio::test]
    async fn test_save_overwrites_wholesale() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("token.json"));

        store.save(&sample_record()).await.unwrap();

        let mut updated = sample_record();
        updated.access_token = SecretString::from("access-789");
        updated.refresh_token = None;
        store.save(&updated).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token.expose_secret(), "access-789");
        assert!(loaded.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("token.json"));

        store.delete().await.unwrap();
        store.save(&sample_record()).await.unwrap();
        store.delete().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = CredentialStore::new(path);
        assert!(store.load().await.is_err());
    }

    #[test]
    fn test_expires_within() {
        let mut record = sample_record();
        record.expires_at = Utc::now() + chrono::Duration::seconds(30);
        assert!(record.expires_within(chrono::Duration::seconds(60)));
        assert!(!record.expires_within(chrono::Duration::seconds(10)));
    }
}
