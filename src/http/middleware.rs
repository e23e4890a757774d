//! Authentication and rate-limit middleware

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::app::AppState;
use crate::auth::cookies::{access_token_from, refresh_token_from};
use crate::auth::Authenticated;
use crate::error::ApiError;

/// Middleware to require authentication
///
/// Puts [`AuthenticatedUser`](crate::auth::AuthenticatedUser) into request
/// extensions. When the session had to be refreshed, the new cookies are
/// appended to whatever the handler returned.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let access_token = access_token_from(&jar, request.headers());
    let refresh_token = refresh_token_from(&jar);

    let Authenticated { user, refreshed } = state
        .guard
        .authenticate(access_token.as_deref(), refresh_token.as_deref())
        .await?;

    request.extensions_mut().insert(user);
    let response = next.run(request).await;

    Ok(match refreshed {
        Some(session) => (state.cookies.set_session(CookieJar::new(), &session), response).into_response(),
        None => response,
    })
}

/// Process-wide throttle on credential endpoints (signup, login)
pub async fn limit_credentials(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth_limiter.check() {
        return Err(ApiError::TooManyRequests(
            "Too many authentication attempts. Please try again shortly.".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

/// Give axum's bare 405 responses the standard error body
pub async fn uniform_method_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() == StatusCode::METHOD_NOT_ALLOWED
        && !response.headers().contains_key(header::CONTENT_TYPE)
    {
        let allow = response.headers().get(header::ALLOW).cloned();
        let mut standard = ApiError::MethodNotAllowed.into_response();
        if let Some(allow) = allow {
            standard.headers_mut().insert(header::ALLOW, allow);
        }
        return standard;
    }
    response
}
