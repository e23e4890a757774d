//! Access-token validation with transparent refresh

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::jwt::{verify_jwt, JwtError};
use crate::error::ApiError;
use crate::store::{AuthUser, Session, SupabaseClient};
use crate::util::rate_limit::RefreshFlights;

/// Authenticated user extractor result
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    /// The (possibly just refreshed) token, forwarded to PostgREST for RLS
    pub access_token: String,
}

/// Outcome of [`SessionGuard::authenticate`]
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: AuthenticatedUser,
    /// Set when the access token had to be refreshed; its tokens must be
    /// written back to the client's cookies.
    pub refreshed: Option<Session>,
}

/// Shared outcome of one refresh-token exchange; the error is the vendor message
pub type RefreshOutcome = Result<(Session, AuthUser), String>;

#[derive(Clone)]
pub struct SessionGuard {
    supabase: SupabaseClient,
    jwt_secret: Option<String>,
    flights: RefreshFlights<RefreshOutcome>,
}

impl SessionGuard {
    pub fn new(
        supabase: SupabaseClient,
        jwt_secret: Option<String>,
        flights: RefreshFlights<RefreshOutcome>,
    ) -> Self {
        Self {
            supabase,
            jwt_secret,
            flights,
        }
    }

    pub async fn authenticate(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<Authenticated, ApiError> {
        let access_token =
            access_token.ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let reason = match self.validate(access_token).await {
            Ok(user) => {
                return Ok(Authenticated {
                    user,
                    refreshed: None,
                })
            }
            Err(reason) => reason,
        };
        debug!(reason = %reason, "Access token rejected, attempting refresh");

        let refresh_token = refresh_token.ok_or_else(|| {
            ApiError::Unauthorized("Token expired and no refresh token available".to_string())
        })?;

        // Parallel requests carrying the same expired cookies share one exchange
        let flight = self.flights.join(refresh_token);
        let outcome = flight.get_or_init(|| self.refresh(refresh_token)).await.clone();

        match outcome {
            Ok((session, user)) => Ok(Authenticated {
                user: identity(user, session.access_token.clone()),
                refreshed: Some(session),
            }),
            Err(message) => {
                self.flights.forget(refresh_token, &flight);
                Err(ApiError::Unauthorized(format!("Authentication failed: {}", message)))
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> RefreshOutcome {
        let session = self.supabase.refresh_session(refresh_token).await.map_err(|e| {
            warn!(error = %e, "Session refresh failed");
            e.vendor_message()
        })?;

        let user = match &session.user {
            Some(user) => user.clone(),
            None => self
                .supabase
                .get_user(&session.access_token)
                .await
                .map_err(|e| e.vendor_message())?,
        };
        info!(user_id = %user.id, "Session refreshed during request");
        Ok((session, user))
    }

    /// Local HS256 check when a JWT secret is configured, GoTrue otherwise
    /// or when the token is not one we can verify locally.
    async fn validate(&self, access_token: &str) -> Result<AuthenticatedUser, String> {
        if let Some(secret) = &self.jwt_secret {
            match verify_jwt(access_token, secret) {
                Ok(claims) => {
                    return Ok(AuthenticatedUser {
                        user_id: claims.sub,
                        email: claims.email,
                        access_token: access_token.to_string(),
                    })
                }
                Err(JwtError::Expired) => return Err(JwtError::Expired.to_string()),
                Err(JwtError::BadSignature) => return Err(JwtError::BadSignature.to_string()),
                Err(JwtError::Malformed) => {}
            }
        }

        self.supabase
            .get_user(access_token)
            .await
            .map(|user| identity(user, access_token.to_string()))
            .map_err(|e| e.vendor_message())
    }
}

fn identity(user: AuthUser, access_token: String) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: user.id,
        email: user.email,
        access_token,
    }
}
