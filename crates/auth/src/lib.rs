//! GoTrue client for BucketNest
//!
//! Signs principals in and out against `/auth/v1` and keeps the current
//! session in memory. The stores only ever need the principal id, the access
//! token and a display name; everything else the auth server returns is kept
//! as opaque metadata.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    /// Name the principal signed up with (`full_name`, then `name`).
    pub fn display_name(&self) -> Option<String> {
        ["full_name", "name"]
            .iter()
            .filter_map(|key| self.user_metadata.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|name| !name.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub token_type: String,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => now_secs() >= expires_at,
            None => false,
        }
    }
}

/// Claims carried in a Supabase access token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Reads the claims of an access token without checking its signature.
///
/// The token is only ever verified by the gateway; the client uses the
/// claims to know who it is talking as.
pub fn decode_claims(token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub auto_refresh_token: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
        }
    }
}

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// Auth client
#[derive(Clone)]
pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    options: AuthOptions,
    current_session: Arc<RwLock<Option<Session>>>,
}

impl Auth {
    pub fn new(url: &str, key: &str, http_client: Client, options: AuthOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            options,
            current_session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    async fn post_for_session<T: Serialize>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<Session, AuthError> {
        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::ApiError(format!("{} ({})", error_text, status)));
        }

        let mut session = response.json::<Session>().await?;
        if session.expires_at.is_none() {
            session.expires_at = Some(now_secs() + session.expires_in);
        }
        self.set_session(session.clone());
        Ok(session)
    }

    /// Signs up with email and password; `display_name` lands in user metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Session, AuthError> {
        let url = self.endpoint("/signup");
        let body = PasswordCredentials {
            email,
            password,
            data: display_name.map(|name| serde_json::json!({ "full_name": name })),
        };
        self.post_for_session(&url, &body).await
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = self.endpoint("/token?grant_type=password");
        let body = PasswordCredentials {
            email,
            password,
            data: None,
        };
        self.post_for_session(&url, &body).await
    }

    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let refresh_token = self
            .get_session()
            .map(|s| s.refresh_token)
            .ok_or(AuthError::MissingSession)?;
        let url = self.endpoint("/token?grant_type=refresh_token");
        self.post_for_session(&url, &serde_json::json!({ "refresh_token": refresh_token }))
            .await
    }

    /// Returns a usable access token, refreshing an expired session first.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;
        if session.is_expired() && self.options.auto_refresh_token {
            log::debug!("access token expired, refreshing session");
            return Ok(self.refresh_session().await?.access_token);
        }
        Ok(session.access_token)
    }

    pub async fn get_user(&self) -> Result<User, AuthError> {
        let token = self.access_token().await?;
        let response = self
            .http_client
            .get(self.endpoint("/user"))
            .header("apikey", &self.key)
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::ApiError(format!(
                "Failed to get user: {}",
                error_text
            )));
        }
        Ok(response.json::<User>().await?)
    }

    /// Ends the session server-side and forgets it locally.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self
            .get_session()
            .map(|s| s.access_token)
            .ok_or(AuthError::MissingSession)?;

        let response = self
            .http_client
            .post(self.endpoint("/logout"))
            .header("apikey", &self.key)
            .bearer_auth(token)
            .send()
            .await;

        // The local session is dropped even if the server call fails.
        self.clear_session();

        let response = response?;
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::warn!("sign out returned an error: {}", error_text);
            return Err(AuthError::ApiError(error_text));
        }
        Ok(())
    }

    pub fn get_session(&self) -> Option<Session> {
        self.current_session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_session(&self, session: Session) {
        *self
            .current_session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    pub fn clear_session(&self) {
        *self
            .current_session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn decode_claims_ignores_signature() {
        let claims = Claims {
            sub: "8b1c6c3e-3a4b-4a59-9d0e-0c1b2e3f4a5b".to_string(),
            exp: Some(1),
            email: Some("ana@example.com".to_string()),
            role: Some("authenticated".to_string()),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap();

        let decoded = decode_claims(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn decode_claims_rejects_garbage() {
        assert!(matches!(
            decode_claims("not-a-jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn display_name_prefers_full_name() {
        let user = User {
            id: "u1".to_string(),
            email: None,
            phone: None,
            app_metadata: Value::Null,
            user_metadata: serde_json::json!({ "name": "ana", "full_name": "Ana Lima" }),
            created_at: None,
        };
        assert_eq!(user.display_name().as_deref(), Some("Ana Lima"));

        let blank = User {
            user_metadata: serde_json::json!({ "full_name": "  " }),
            ..user
        };
        assert_eq!(blank.display_name(), None);
    }
}
