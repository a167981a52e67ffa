//! Authentication module
//!
//! Bearer token verification for review mutations and email/password
//! accounts, delegated to an identity provider.

mod identity;
mod memory;

pub use identity::IdentityToolkit;
pub use memory::MemoryAuth;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A verified caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Subject {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Tokens issued on sign-up or sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id_token: String,
    pub refresh_token: String,
    pub uid: String,
    pub email: String,
    /// Token lifetime in seconds, as a decimal string
    pub expires_in: String,
}

/// Authentication failures
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Token rejected by the provider
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    /// Unknown email or wrong password
    #[error("invalid email or password")]
    InvalidLogin,
    #[error("email already registered")]
    EmailExists,
    /// Weak password, malformed email and the like
    #[error("{0}")]
    InvalidInput(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("identity request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Verifies bearer tokens
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Subject, AuthError>;
}

/// Creates accounts and signs them in
#[async_trait]
pub trait AccountProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;
}

/// Passwords shorter than this are rejected as weak
pub const MIN_PASSWORD_LEN: usize = 6;

/// Session lifetime handed out by providers that do not say otherwise
pub const SESSION_LIFETIME_SECS: u64 = 3600;
