//! Staff authentication: identity-provider sign-in, admin check, sessions.

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, AuthError};
use crate::store::ReadStore;

/// Account as reported by the identity provider after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// OAuth sign-in with an ID token issued by `provider_id` (e.g. `google.com`).
    async fn sign_in_with_idp(&self, provider_id: &str, id_token: &str) -> Result<Identity, AuthError>;

    async fn create_account(&self, email: &str, password: &str) -> Result<(), AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;
}

/// Identity Toolkit compatible REST provider.
#[derive(Debug, Clone)]
pub struct RestIdentityProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    photo_url: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

impl RestIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, AuthError> {
        let url = format!("{}/v1/accounts:{}?key={}", self.base_url, method, self.api_key);
        let response = self.client.post(&url).json(&body).send().await?;

        if response.status().is_success() {
            return Ok(response.json::<T>().await?);
        }

        let status = response.status();
        let code = match response.json::<ProviderErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => format!("HTTP_{}", status.as_u16()),
        };
        warn!("Identity provider rejected {}: {}", method, code);
        Err(AuthError::Rejected(friendly_message(&code)))
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let response: SignInResponse = self
            .call(
                "signInWithPassword",
                serde_json::json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(response.into())
    }

    async fn sign_in_with_idp(&self, provider_id: &str, id_token: &str) -> Result<Identity, AuthError> {
        let response: SignInResponse = self
            .call(
                "signInWithIdp",
                serde_json::json!({
                    "postBody": format!("id_token={}&providerId={}", id_token, provider_id),
                    "requestUri": "http://localhost",
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Ok(response.into())
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .call("signUp", serde_json::json!({ "email": email, "password": password }))
            .await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .call(
                "sendOobCode",
                serde_json::json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        Ok(())
    }
}

impl From<SignInResponse> for Identity {
    fn from(response: SignInResponse) -> Self {
        Self {
            uid: response.local_id,
            email: response.email,
            display_name: response.display_name,
            photo_url: response.photo_url,
        }
    }
}

/// User-facing text for identity provider error codes.
pub fn friendly_message(code: &str) -> String {
    let code = code.to_ascii_uppercase();
    let message = if code.contains("EMAIL_NOT_FOUND") || code.contains("USER-NOT-FOUND") {
        "User not found. Please check your email and password."
    } else if code.contains("INVALID_PASSWORD") || code.contains("WRONG-PASSWORD") {
        "Invalid password. Please try again."
    } else if code.contains("INVALID_EMAIL") || code.contains("INVALID-EMAIL") {
        "Invalid email. Please check your email and password."
    } else if code.contains("USER_DISABLED") || code.contains("USER-DISABLED") {
        "User is disabled. Please contact support."
    } else if code.contains("TOO_MANY_ATTEMPTS") || code.contains("TOO-MANY-REQUESTS") {
        "Too many requests. Please try again later."
    } else if code.contains("EMAIL_EXISTS") || code.contains("EMAIL-ALREADY-IN-USE") {
        "Email already in use. Please use a different email."
    } else if code.contains("INVALID_LOGIN_CREDENTIALS")
        || code.contains("INVALID_IDP_RESPONSE")
        || code.contains("INVALID-CREDENTIAL")
    {
        "Invalid credential. Please check your email and password."
    } else {
        "Login failed. Please try again."
    };
    message.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffUser {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub user: StaffUser,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Live staff sessions keyed by bearer token.
///
/// Empty at startup, populated by a successful login, cleared by logout or
/// expiry.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(12)),
        }
    }

    pub async fn open(&self, user: StaffUser) -> Session {
        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4(),
            user,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().await.insert(session.token, session.clone());
        session
    }

    pub async fn get(&self, token: Uuid) -> Option<Session> {
        let session = self.sessions.read().await.get(&token).cloned()?;
        if session.expires_at <= Utc::now() {
            self.sessions.write().await.remove(&token);
            return None;
        }
        Some(session)
    }

    pub async fn close(&self, token: Uuid) -> bool {
        self.sessions.write().await.remove(&token).is_some()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops expired sessions every `period`, including those whose token is
    /// never presented again.
    pub async fn run_expiry(self, period: Duration) {
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            let purged = self.purge_expired().await;
            if purged > 0 {
                info!("Purged {} expired staff sessions", purged);
            }
        }
    }
}

/// Sign-in flows: the identity provider vouches for the account, the `users`
/// collection decides whether it may use the admin portal.
#[derive(Clone)]
pub struct Authenticator {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn ReadStore>,
    sessions: SessionStore,
}

impl Authenticator {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn ReadStore>, sessions: SessionStore) -> Self {
        Self {
            identity,
            store,
            sessions,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let identity = self.identity.sign_in_with_password(email, password).await?;
        self.admit(identity).await
    }

    pub async fn login_with_idp(&self, provider_id: &str, id_token: &str) -> Result<Session, AuthError> {
        let identity = self.identity.sign_in_with_idp(provider_id, id_token).await?;
        self.admit(identity).await
    }

    pub async fn logout(&self, token: Uuid) -> bool {
        self.sessions.close(token).await
    }

    /// Creates the account with a throwaway password and mails a reset link.
    pub async fn invite(&self, email: &str) -> Result<(), AuthError> {
        let temporary_password = temporary_password();
        self.identity
            .create_account(email, &temporary_password)
            .await
            .map_err(account_rejected)?;
        self.identity
            .send_password_reset(email)
            .await
            .map_err(account_rejected)?;
        info!("Invitation sent to {}", email);
        Ok(())
    }

    async fn admit(&self, identity: Identity) -> Result<Session, AuthError> {
        let profile = self
            .store
            .find_user(&identity.uid)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        if !profile.is_admin {
            warn!("Rejected non-admin sign-in for {}", identity.uid);
            return Err(AuthError::NotAdmin);
        }

        let session = self
            .sessions
            .open(StaffUser {
                uid: identity.uid,
                display_name: identity.display_name,
                email: identity.email,
                photo_url: identity.photo_url,
                is_admin: true,
            })
            .await;
        info!("Staff session opened for {}", session.user.uid);
        Ok(session)
    }
}

fn account_rejected(err: AuthError) -> AuthError {
    match err {
        AuthError::Rejected(msg) => AuthError::AccountRejected(msg),
        other => other,
    }
}

fn temporary_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// Extracts the caller's live session from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    SessionStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::Unauthenticated)?;
        let sessions = SessionStore::from_ref(state);
        let session = sessions.get(token).await.ok_or(AuthError::Unauthenticated)?;
        Ok(AuthSession(session))
    }
}

fn bearer_token(parts: &Parts) -> Option<Uuid> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .and_then(|token| Uuid::parse_str(token.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff() -> StaffUser {
        StaffUser {
            uid: "u1".to_string(),
            display_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            photo_url: String::new(),
            is_admin: true,
        }
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let sessions = SessionStore::new(Duration::from_secs(60));

        let session = sessions.open(staff()).await;
        assert_eq!(sessions.get(session.token).await.map(|s| s.user.uid), Some("u1".to_string()));

        assert!(sessions.close(session.token).await);
        assert!(sessions.get(session.token).await.is_none());
        assert!(!sessions.close(session.token).await);
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let sessions = SessionStore::new(Duration::ZERO);

        let session = sessions.open(staff()).await;

        assert!(sessions.get(session.token).await.is_none());
        sessions.open(staff()).await;
        assert_eq!(sessions.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn expiry_task_sweeps_abandoned_sessions() {
        let sessions = SessionStore::new(Duration::from_millis(5));
        sessions.open(staff()).await;
        sessions.open(staff()).await;
        assert_eq!(sessions.active_count().await, 2);

        let sweeper = tokio::spawn(sessions.clone().run_expiry(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.abort();

        assert_eq!(sessions.active_count().await, 0);
    }

    #[test]
    fn provider_codes_map_to_friendly_messages() {
        assert_eq!(friendly_message("EMAIL_NOT_FOUND"), "User not found. Please check your email and password.");
        assert_eq!(friendly_message("INVALID_PASSWORD"), "Invalid password. Please try again.");
        assert_eq!(
            friendly_message("TOO_MANY_ATTEMPTS_TRY_LATER : Access disabled"),
            "Too many requests. Please try again later."
        );
        assert_eq!(friendly_message("something else"), "Login failed. Please try again.");
    }

    #[test]
    fn temporary_passwords_are_random_alphanumerics() {
        let a = temporary_password();
        let b = temporary_password();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
