//! Auth endpoints: signup, login, logout, refresh and the current user

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::extract::{ValidJson, Validate};
use crate::app::AppState;
use crate::auth::cookies::{access_token_from, refresh_token_from};
use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, FieldError};
use crate::store::{AuthUser, SupabaseError};

pub const MIN_PASSWORD_LEN: usize = 8;

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

impl Validate for SignupRequest {
    fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        self.email = self.email.trim().to_lowercase();
        if !self.email.contains('@') || !self.email.contains('.') {
            errors.push(FieldError::new("email", "Invalid email format"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(FieldError::new(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        self.email = self.email.trim().to_lowercase();
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: Option<String>,
}

impl From<&AuthUser> for UserSummary {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserSummary,
    #[serde(rename = "expiresAt")]
    pub expires_at: u64,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    #[serde(rename = "expiresAt")]
    pub expires_at: u64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: Option<String>,
    pub beta_access: bool,
    pub site_beta: bool,
    pub created_at: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(req): ValidJson<SignupRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let outcome = state
        .supabase
        .sign_up(&req.email, &req.password)
        .await
        .map_err(signup_error)?;

    let session = outcome.session.ok_or_else(|| {
        error!(user_id = %outcome.user.id, "Signup returned no session");
        ApiError::Server("Signup failed: no session returned".to_string())
    })?;
    let user = outcome.user;
    info!(user_id = %user.id, "User signed up");

    // Agent provisioning never fails the signup
    if let Err(e) = state.agents.provision(user.id).await {
        error!(user_id = %user.id, error = %e, "Failed to provision agent-user");
    }

    let expires_at = session.expires_at_ms();
    let jar = state.cookies.set_session(jar, &session);
    Ok((
        jar,
        Json(AuthResponse {
            user: UserSummary::from(&user),
            expires_at,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let session = state
        .supabase
        .sign_in_with_password(&req.email, &req.password)
        .await
        .map_err(login_error)?;

    let user = match &session.user {
        Some(user) => user.clone(),
        None => state
            .supabase
            .get_user(&session.access_token)
            .await
            .map_err(|e| ApiError::upstream("Login failed", &e))?,
    };
    info!(user_id = %user.id, "User logged in");

    let expires_at = session.expires_at_ms();
    let jar = state.cookies.set_session(jar, &session);
    Ok((
        jar,
        Json(AuthResponse {
            user: UserSummary::from(&user),
            expires_at,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(token) = access_token_from(&jar, &headers) {
        end_sessions(&state, &token).await;
    }

    (
        state.cookies.clear(jar),
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}

/// Best effort: sign out the user and their agent-user
async fn end_sessions(state: &AppState, access_token: &str) {
    let user = match state.supabase.get_user(access_token).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Logout with an unusable access token");
            return;
        }
    };

    if let Err(e) = state.supabase.sign_out(access_token).await {
        warn!(user_id = %user.id, error = %e, "Failed to sign out user");
    }
    state.agents.sign_out(user.id).await;
    info!(user_id = %user.id, "User logged out");
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RefreshResponse>), ApiError> {
    let refresh_token = refresh_token_from(&jar)
        .ok_or_else(|| ApiError::Unauthorized("No refresh token available".to_string()))?;

    let session = state
        .supabase
        .refresh_session(&refresh_token)
        .await
        .map_err(|e| {
            warn!(error = %e, "Refresh failed");
            ApiError::Unauthorized(format!("Refresh failed: {}", e.vendor_message()))
        })?;

    let expires_at = session.expires_at_ms();
    Ok((state.cookies.set_session(jar, &session), Json(RefreshResponse { expires_at })))
}

pub async fn me(Extension(user): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user: UserSummary {
            id: user.user_id,
            email: user.email,
        },
    })
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let auth_user = state
        .supabase
        .get_user(&user.access_token)
        .await
        .map_err(|e| match e.status() {
            Some(404) => ApiError::NotFound("User not found".to_string()),
            _ => ApiError::upstream("Failed to fetch profile", &e),
        })?;

    Ok(Json(ProfileResponse {
        id: auth_user.id,
        email: auth_user.email.clone(),
        beta_access: auth_user.metadata_flag("beta_access", "betaAccess"),
        site_beta: auth_user.metadata_flag("site_beta", "siteBeta"),
        created_at: auth_user.created_at,
    }))
}

// ============================================================================
// Vendor error mapping
// ============================================================================

fn signup_error(err: SupabaseError) -> ApiError {
    let message = err.vendor_message();
    let lowered = message.to_lowercase();
    if lowered.contains("already registered") || lowered.contains("already exists") {
        return ApiError::BadRequest("Email already exists".to_string());
    }
    match err.status() {
        Some(status) if (400..500).contains(&status) && status != 429 => ApiError::BadRequest(message),
        _ => ApiError::upstream("Signup failed", &err),
    }
}

fn login_error(err: SupabaseError) -> ApiError {
    let lowered = err.vendor_message().to_lowercase();
    if lowered.contains("invalid") || lowered.contains("incorrect") {
        return ApiError::Unauthorized("Invalid email or password".to_string());
    }
    if lowered.contains("locked") || lowered.contains("disabled") || lowered.contains("banned") {
        return ApiError::Forbidden("Account is locked or disabled".to_string());
    }
    if lowered.contains("not confirmed") {
        return ApiError::Forbidden("Email not confirmed".to_string());
    }
    ApiError::upstream("Login failed", &err)
}
