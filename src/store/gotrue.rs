//! Supabase Auth (GoTrue) pass-through
//!
//! One method per vendor call; no token logic lives here beyond decoding
//! the responses.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};
use crate::util::time::unix_millis;

/// Lifetime assumed when GoTrue omits `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// A row of `auth.users` as GoTrue exposes it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AuthUser {
    /// Boolean metadata flag, accepting either snake_case or camelCase keys
    pub fn metadata_flag(&self, snake: &str, camel: &str) -> bool {
        self.user_metadata
            .get(snake)
            .or_else(|| self.user_metadata.get(camel))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Tokens issued by GoTrue
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

impl Session {
    /// Access token lifetime in seconds
    pub fn expires_in_secs(&self) -> u64 {
        self.expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    }

    /// Access token expiry as epoch milliseconds
    pub fn expires_at_ms(&self) -> u64 {
        unix_millis() + self.expires_in_secs() * 1000
    }
}

/// Result of a sign-up; `session` is `None` when email confirmation is required
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

impl SupabaseClient {
    /// Create an auth account (`POST /auth/v1/signup`). Never retried.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, SupabaseError> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .send_once("sign_up", || {
                self.auth_request(Method::POST, "signup").json(&body)
            })
            .await?;

        let payload: Value = response.json().await.map_err(SupabaseError::Parse)?;
        parse_sign_up(payload)
    }

    /// Password grant (`POST /auth/v1/token?grant_type=password`)
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, SupabaseError> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .send("sign_in_with_password", || {
                self.auth_request(Method::POST, "token?grant_type=password")
                    .json(&body)
            })
            .await?;
        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Refresh-token grant (`POST /auth/v1/token?grant_type=refresh_token`)
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, SupabaseError> {
        let body = json!({ "refresh_token": refresh_token });
        let response = self
            .send("refresh_session", || {
                self.auth_request(Method::POST, "token?grant_type=refresh_token")
                    .json(&body)
            })
            .await?;
        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Resolve the user an access token belongs to (`GET /auth/v1/user`)
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, SupabaseError> {
        if access_token.is_empty() {
            return Err(SupabaseError::MissingToken);
        }
        let response = self
            .send("get_user", || {
                self.auth_request(Method::GET, "user")
                    .bearer_auth(access_token)
            })
            .await?;
        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Revoke the session's refresh tokens server-side (`POST /auth/v1/logout`)
    pub async fn sign_out(&self, access_token: &str) -> Result<(), SupabaseError> {
        if access_token.is_empty() {
            return Err(SupabaseError::MissingToken);
        }
        self.send("sign_out", || {
            self.auth_request(Method::POST, "logout")
                .bearer_auth(access_token)
        })
        .await?;
        Ok(())
    }
}

/// GoTrue answers sign-up with a full session when auto-confirm is on, or
/// with the bare user object when the address still has to be confirmed.
fn parse_sign_up(payload: Value) -> Result<SignUpOutcome, SupabaseError> {
    if payload.get("access_token").is_some() {
        let session: Session = serde_json::from_value(payload)?;
        let user = session.user.clone().ok_or(SupabaseError::NoRowReturned)?;
        return Ok(SignUpOutcome {
            user,
            session: Some(session),
        });
    }

    let user = match payload.get("user") {
        Some(user) if !user.is_null() => serde_json::from_value(user.clone())?,
        _ => serde_json::from_value(payload)?,
    };
    Ok(SignUpOutcome {
        user,
        session: None,
    })
}
