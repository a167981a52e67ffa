//! In-process identity provider for local development and tests

use super::{
    AccountProvider, AuthError, CredentialVerifier, Session, Subject, MIN_PASSWORD_LEN,
    SESSION_LIFETIME_SECS,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

struct Account {
    uid: String,
    password_hash: String,
}

/// Accounts and sessions held in memory. Tokens never expire.
#[derive(Default)]
pub struct MemoryAuth {
    /// email -> account
    accounts: RwLock<HashMap<String, Account>>,
    /// id token -> subject
    sessions: RwLock<HashMap<String, Subject>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept fixed tokens (token -> uid), e.g. from configuration
    pub fn with_static_tokens(tokens: &HashMap<String, String>) -> Self {
        let sessions = tokens
            .iter()
            .map(|(token, uid)| (token.clone(), Subject::new(uid.as_str())))
            .collect();
        if !tokens.is_empty() {
            info!("Accepting {} static bearer tokens", tokens.len());
        }
        Self {
            accounts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(sessions),
        }
    }

    async fn issue(&self, subject: Subject) -> Session {
        let id_token = Uuid::new_v4().simple().to_string();
        let refresh_token = Uuid::new_v4().simple().to_string();
        let session = Session {
            id_token: id_token.clone(),
            refresh_token,
            uid: subject.uid.clone(),
            email: subject.email.clone().unwrap_or_default(),
            expires_in: SESSION_LIFETIME_SECS.to_string(),
        };
        self.sessions.write().await.insert(id_token, subject);
        session
    }
}

fn hash_password(uid: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uid.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::InvalidInput("email address is invalid".to_string())),
    }
}

#[async_trait]
impl CredentialVerifier for MemoryAuth {
    async fn verify(&self, token: &str) -> Result<Subject, AuthError> {
        self.sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidCredential("unknown token".to_string()))
    }
}

#[async_trait]
impl AccountProvider for MemoryAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let uid = Uuid::new_v4().simple().to_string();
        {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailExists);
            }
            accounts.insert(
                email.clone(),
                Account {
                    uid: uid.clone(),
                    password_hash: hash_password(&uid, password),
                },
            );
        }

        Ok(self.issue(Subject::new(uid).with_email(email)).await)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidLogin)?;
        let uid = {
            let accounts = self.accounts.read().await;
            match accounts.get(&email) {
                Some(account) if account.password_hash == hash_password(&account.uid, password) => {
                    account.uid.clone()
                }
                _ => return Err(AuthError::InvalidLogin),
            }
        };

        Ok(self.issue(Subject::new(uid).with_email(email)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_up_then_verify() {
        let auth = MemoryAuth::new();
        let session = auth.sign_up("Ann@Example.com", "secret1").await.unwrap();
        assert_eq!(session.email, "ann@example.com");
        assert_eq!(session.expires_in, "3600");

        let subject = auth.verify(&session.id_token).await.unwrap();
        assert_eq!(subject.uid, session.uid);
        assert_eq!(subject.email.as_deref(), Some("ann@example.com"));
    }

    #[tokio::test]
    async fn test_duplicate_and_weak() {
        let auth = MemoryAuth::new();
        auth.sign_up("ann@example.com", "secret1").await.unwrap();

        assert!(matches!(
            auth.sign_up("ann@example.com", "secret2").await,
            Err(AuthError::EmailExists)
        ));
        assert!(matches!(
            auth.sign_up("bob@example.com", "abc").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            auth.sign_up("not-an-email", "secret1").await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_in() {
        let auth = MemoryAuth::new();
        let created = auth.sign_up("ann@example.com", "secret1").await.unwrap();

        let session = auth.sign_in("ann@example.com", "secret1").await.unwrap();
        assert_eq!(session.uid, created.uid);
        assert_ne!(session.id_token, created.id_token);

        assert!(matches!(
            auth.sign_in("ann@example.com", "wrong").await,
            Err(AuthError::InvalidLogin)
        ));
        assert!(matches!(
            auth.sign_in("nobody@example.com", "secret1").await,
            Err(AuthError::InvalidLogin)
        ));
    }

    #[tokio::test]
    async fn test_static_tokens() {
        let mut tokens = HashMap::new();
        tokens.insert("dev-token".to_string(), "dev-user".to_string());
        let auth = MemoryAuth::with_static_tokens(&tokens);

        assert_eq!(auth.verify("dev-token").await.unwrap().uid, "dev-user");
        assert!(matches!(
            auth.verify("other").await,
            Err(AuthError::InvalidCredential(_))
        ));
    }
}
