//! Agent-user lifecycle: provisioning at signup, cached sessions for
//! RLS-scoped work, and teardown at logout

use std::sync::Arc;

use axum::http::StatusCode;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cipher::CipherError;
use super::credentials::{agent_email, generate_password, AgentCredentialStore, AgentCredentials};
use crate::error::ApiError;
use crate::store::{ProfileStore, Session, SupabaseClient, SupabaseError};
use crate::util::time::unix_secs;

/// A live GoTrue session of an agent-user
#[derive(Debug, Clone)]
pub struct AgentSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: u64,
    pub agent_user_id: Uuid,
}

/// Cached agent sessions are renewed this long before they expire
pub const SESSION_EXPIRY_MARGIN_SECS: u64 = 300;

impl AgentSession {
    fn from_session(session: &Session, agent_user_id: Uuid) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: unix_secs() + session.expires_in_secs(),
            agent_user_id,
        }
    }

    /// Unexpired with at least [`SESSION_EXPIRY_MARGIN_SECS`] to spare
    pub fn is_live(&self) -> bool {
        self.expires_at > unix_secs() + SESSION_EXPIRY_MARGIN_SECS
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent credentials not found for user")]
    CredentialsNotFound,

    #[error("Agent authentication failed: {0}")]
    AuthFailed(String),

    #[error("Agent credential encryption failed: {0}")]
    Cipher(#[from] CipherError),

    #[error("Supabase call failed: {0}")]
    Upstream(#[from] SupabaseError),
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::CredentialsNotFound => ApiError::Coded {
                status: StatusCode::NOT_FOUND,
                code: "agent_credentials_not_found",
                message: err.to_string(),
            },
            AgentError::AuthFailed(_) => ApiError::Coded {
                status: StatusCode::UNAUTHORIZED,
                code: "agent_auth_failed",
                message: "Agent authentication failed".to_string(),
            },
            AgentError::Cipher(_) | AgentError::Upstream(_) => {
                warn!(error = %err, "Agent session error");
                ApiError::Coded {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "agent_session_error",
                    message: "Agent session error".to_string(),
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct AgentService {
    supabase: SupabaseClient,
    credentials: AgentCredentialStore,
    profiles: ProfileStore,
    sessions: Arc<DashMap<Uuid, AgentSession>>,
    email_domain: String,
}

impl AgentService {
    pub fn new(
        supabase: SupabaseClient,
        credentials: AgentCredentialStore,
        profiles: ProfileStore,
        email_domain: String,
    ) -> Self {
        Self {
            supabase,
            credentials,
            profiles,
            sessions: Arc::new(DashMap::new()),
            email_domain,
        }
    }

    /// Create the agent-user account paired with `user_id` and keep its
    /// credentials. Returns the agent's own user ID.
    pub async fn provision(&self, user_id: Uuid) -> Result<Uuid, AgentError> {
        let email = agent_email(user_id, &self.email_domain);
        let password = generate_password();

        let outcome = self.supabase.sign_up(&email, &password).await?;
        let agent_user_id = outcome.user.id;

        self.credentials.store(
            user_id,
            &AgentCredentials {
                agent_user_id,
                agent_email: email,
                password,
            },
        )?;

        info!(user_id = %user_id, agent_user_id = %agent_user_id, "Agent-user provisioned");
        Ok(agent_user_id)
    }

    /// Live session for the user's agent: cached while unexpired, refreshed
    /// when stale, signed in from stored credentials otherwise.
    pub async fn authenticate(&self, user_id: Uuid) -> Result<AgentSession, AgentError> {
        let cached = self.sessions.get(&user_id).map(|entry| entry.value().clone());
        match cached {
            Some(session) if session.is_live() => {
                debug!(user_id = %user_id, "Using cached agent session");
                Ok(session)
            }
            Some(_) => self.refresh(user_id).await,
            None => self.sign_in(user_id).await,
        }
    }

    /// Refresh the cached session, falling back to a full sign-in
    pub async fn refresh(&self, user_id: Uuid) -> Result<AgentSession, AgentError> {
        let Some(cached) = self.sessions.get(&user_id).map(|entry| entry.value().clone()) else {
            return self.sign_in(user_id).await;
        };

        match self.supabase.refresh_session(&cached.refresh_token).await {
            Ok(session) => {
                let refreshed = AgentSession::from_session(&session, cached.agent_user_id);
                self.sessions.insert(user_id, refreshed.clone());
                info!(user_id = %user_id, "Agent session refreshed");
                Ok(refreshed)
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Agent session refresh failed, re-authenticating");
                self.sessions.remove(&user_id);
                self.sign_in(user_id).await
            }
        }
    }

    /// Drop the cached session so the next use signs in again
    pub fn revoke(&self, user_id: Uuid) {
        if self.sessions.remove(&user_id).is_some() {
            info!(user_id = %user_id, "Agent session revoked");
        }
    }

    /// Revoke the agent's tokens server-side and forget the cached session.
    /// Best effort: failures are logged, never returned.
    pub async fn sign_out(&self, user_id: Uuid) {
        if !self.credentials.contains(user_id) {
            self.revoke(user_id);
            return;
        }

        match self.authenticate(user_id).await {
            Ok(session) => {
                if let Err(e) = self.supabase.sign_out(&session.access_token).await {
                    warn!(user_id = %user_id, error = %e, "Failed to sign out agent-user");
                }
            }
            Err(e) => warn!(user_id = %user_id, error = %e, "Could not open agent session for sign-out"),
        }
        self.revoke(user_id);
    }

    async fn sign_in(&self, user_id: Uuid) -> Result<AgentSession, AgentError> {
        let credentials = self
            .credentials
            .get(user_id)?
            .ok_or(AgentError::CredentialsNotFound)?;

        let session = self
            .supabase
            .sign_in_with_password(&credentials.agent_email, &credentials.password)
            .await
            .map_err(|e| match e.status() {
                Some(status) if (400..500).contains(&status) => AgentError::AuthFailed(e.vendor_message()),
                _ => AgentError::Upstream(e),
            })?;

        let agent_session = AgentSession::from_session(&session, credentials.agent_user_id);
        self.sessions.insert(user_id, agent_session.clone());

        if let Err(e) = self.profiles.touch_agent_last_used(user_id).await {
            warn!(user_id = %user_id, error = %e, "Failed to update agent_last_used_at");
        }

        info!(
            user_id = %user_id,
            expires_in = session.expires_in_secs(),
            "Agent authenticated"
        );
        Ok(agent_session)
    }
}
