//! Identity Toolkit REST (v1) client

use super::{AccountProvider, AuthError, CredentialVerifier, Session, Subject};
use crate::config::BackendSettings;
use crate::network::HttpClient;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value as Json};
use tracing::{debug, warn};
use url::Url;

/// Identity provider backed by the Identity Toolkit `accounts:*` endpoints
pub struct IdentityToolkit {
    client: HttpClient,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    expires_in: Option<String>,
}

impl From<TokenResponse> for Session {
    fn from(r: TokenResponse) -> Self {
        Session {
            id_token: r.id_token,
            refresh_token: r.refresh_token,
            uid: r.local_id,
            email: r.email,
            expires_in: r
                .expires_in
                .unwrap_or_else(|| super::SESSION_LIFETIME_SECS.to_string()),
        }
    }
}

impl IdentityToolkit {
    pub fn new(client: HttpClient, settings: &BackendSettings) -> anyhow::Result<Self> {
        let api_key = match settings.api_key {
            Some(ref key) if !key.is_empty() => key.clone(),
            _ => anyhow::bail!("backend.api_key is required for the firebase backend"),
        };
        Url::parse(&settings.identity_url)?;

        Ok(Self {
            client,
            base_url: settings.identity_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// POST to `accounts:{method}` and return the parsed body
    async fn call(&self, method: &str, body: Json) -> Result<Json, AuthError> {
        let mut url = Url::parse(&format!("{}/accounts:{}", self.base_url, method))
            .map_err(|e| AuthError::Unavailable(format!("bad identity url: {}", e)))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);

        debug!("identity call accounts:{}", method);
        let response = self
            .client
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            return serde_json::from_str(&text)
                .map_err(|e| AuthError::Unavailable(format!("malformed identity response: {}", e)));
        }
        Err(provider_error(status.as_u16(), &text))
    }

    async fn token_call(&self, method: &str, email: &str, password: &str) -> Result<Session, AuthError> {
        let body = self
            .call(
                method,
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::Unavailable(format!("malformed token response: {}", e)))?;
        Ok(token.into())
    }
}

/// Map a provider error body onto an auth error.
///
/// Messages look like `WEAK_PASSWORD : Password should be at least 6
/// characters`; only the code before the colon matters.
fn provider_error(status: u16, body: &str) -> AuthError {
    let message = serde_json::from_str::<Json>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_default();
    let code = message.split(':').next().unwrap_or_default().trim();

    match code {
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" | "USER_DISABLED"
        | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => AuthError::InvalidCredential(code.to_string()),
        "INVALID_LOGIN_CREDENTIALS" | "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" => {
            AuthError::InvalidLogin
        }
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "WEAK_PASSWORD" => AuthError::InvalidInput("password is too weak".to_string()),
        "INVALID_EMAIL" => AuthError::InvalidInput("email address is invalid".to_string()),
        "MISSING_PASSWORD" => AuthError::InvalidInput("password is required".to_string()),
        "MISSING_EMAIL" => AuthError::InvalidInput("email is required".to_string()),
        _ => {
            warn!("identity provider returned {}: {}", status, message);
            AuthError::Unavailable(format!("provider returned {}", status))
        }
    }
}

#[async_trait]
impl CredentialVerifier for IdentityToolkit {
    async fn verify(&self, token: &str) -> Result<Subject, AuthError> {
        let body = self.call("lookup", json!({ "idToken": token })).await?;
        let lookup: LookupResponse = serde_json::from_value(body)
            .map_err(|e| AuthError::Unavailable(format!("malformed lookup response: {}", e)))?;

        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AuthError::InvalidCredential("USER_NOT_FOUND".to_string()))?;
        if user.disabled {
            return Err(AuthError::InvalidCredential("USER_DISABLED".to_string()));
        }

        Ok(Subject {
            uid: user.local_id,
            email: user.email,
        })
    }
}

#[async_trait]
impl AccountProvider for IdentityToolkit {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.token_call("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.token_call("signInWithPassword", email, password).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn toolkit_for(server: &MockServer) -> IdentityToolkit {
        let settings = BackendSettings {
            identity_url: format!("{}/v1", server.uri()),
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        IdentityToolkit::new(HttpClient::new().unwrap(), &settings).unwrap()
    }

    fn error_body(message: &str) -> Json {
        json!({ "error": { "code": 400, "message": message } })
    }

    #[test]
    fn test_requires_api_key() {
        let settings = BackendSettings::default();
        assert!(IdentityToolkit::new(HttpClient::new().unwrap(), &settings).is_err());
    }

    #[tokio::test]
    async fn test_verify_returns_subject() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:lookup"))
            .and(query_param("key", "k"))
            .and(body_partial_json(json!({ "idToken": "tok" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [{ "localId": "uid-1", "email": "ann@example.com" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let subject = toolkit_for(&server).verify("tok").await.unwrap();
        assert_eq!(subject, Subject::new("uid-1").with_email("ann@example.com"));
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:lookup"))
            .respond_with(ResponseTemplate::new(400).set_body_json(error_body("INVALID_ID_TOKEN")))
            .mount(&server)
            .await;

        let result = toolkit_for(&server).verify("bad").await;
        assert!(matches!(result, Err(AuthError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn test_sign_up_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .and(body_partial_json(json!({
                "email": "ann@example.com",
                "returnSecureToken": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "idToken": "id",
                "refreshToken": "refresh",
                "localId": "uid-1",
                "email": "ann@example.com",
                "expiresIn": "3600"
            })))
            .mount(&server)
            .await;

        let session = toolkit_for(&server)
            .sign_up("ann@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(session.uid, "uid-1");
        assert_eq!(session.id_token, "id");
        assert_eq!(session.expires_in, "3600");
    }

    #[tokio::test]
    async fn test_sign_up_error_codes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .and(body_partial_json(json!({ "email": "taken@example.com" })))
            .respond_with(ResponseTemplate::new(400).set_body_json(error_body("EMAIL_EXISTS")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signUp"))
            .and(body_partial_json(json!({ "email": "weak@example.com" })))
            .respond_with(ResponseTemplate::new(400).set_body_json(error_body(
                "WEAK_PASSWORD : Password should be at least 6 characters",
            )))
            .mount(&server)
            .await;

        let toolkit = toolkit_for(&server);
        assert!(matches!(
            toolkit.sign_up("taken@example.com", "secret1").await,
            Err(AuthError::EmailExists)
        ));
        assert!(matches!(
            toolkit.sign_up("weak@example.com", "x").await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_in_bad_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(error_body("INVALID_LOGIN_CREDENTIALS")),
            )
            .mount(&server)
            .await;

        let result = toolkit_for(&server).sign_in("ann@example.com", "nope").await;
        assert!(matches!(result, Err(AuthError::InvalidLogin)));
    }

    #[tokio::test]
    async fn test_unexpected_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/accounts:signInWithPassword"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let result = toolkit_for(&server).sign_in("ann@example.com", "secret1").await;
        assert!(matches!(result, Err(AuthError::Unavailable(_))));
    }
}
