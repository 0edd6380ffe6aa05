//! Delegated Google authorization: OAuth2 code flow, credential
//! persistence, and transparent refresh.

mod manager;
mod store;

pub use manager::{AuthManager, AuthStatus};
pub use store::{AuthorizationRecord, CredentialStore};
