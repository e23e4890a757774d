//! HTTP route definitions

use std::any::Any;

use axum::{
    extract::{Extension, State},
    http::{header, HeaderValue, Method},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::error;

use super::middleware::{limit_credentials, require_auth, uniform_method_errors};
use super::request_id::{request_id_timing, RequestId, X_DURATION_MS, X_REQUEST_ID};
use super::{agent, analytics, auth, ideas};
use crate::app::AppState;
use crate::error::ApiError;
use crate::util::time::{uptime_secs, Timer};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let allowed_origins: Vec<HeaderValue> = state
        .config
        .cors_origins()
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, X_REQUEST_ID])
        .expose_headers([X_REQUEST_ID, X_DURATION_MS])
        .allow_credentials(true);

    // Credential routes (throttled)
    let credential_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_credentials));

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/refresh", post(auth::refresh));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/me/profile", get(auth::profile))
        .route("/me/profile", get(auth::profile))
        .route("/ideas", get(ideas::list).post(ideas::create))
        .route(
            "/ideas/:id",
            get(ideas::get).patch(ideas::update).delete(ideas::delete),
        )
        .route("/analytics/items-by-date", get(analytics::items_by_date))
        .route("/analytics/items-by-status", get(analytics::items_by_status))
        .route("/analytics/tags-usage", get(analytics::tags_usage))
        .route("/agent/tools/:tool", post(agent::run_tool))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .merge(credential_routes)
        .merge(public_routes)
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api)
        .fallback(fallback_handler)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(uniform_method_errors))
        .layer(middleware::from_fn(request_id_timing))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn fallback_handler() -> ApiError {
    ApiError::NotFound("Resource not found".to_string())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "Handler panicked");
    ApiError::Internal(detail).into_response()
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    request_id: String,
    database: &'static str,
    latency_ms: u64,
    uptime_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn health_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
) -> Json<HealthResponse> {
    let timer = Timer::new();
    let probe = state.profiles.probe().await;
    let latency_ms = timer.elapsed_ms();

    let (status, database, error) = match probe {
        Ok(()) => ("ok", "connected", None),
        Err(e) => {
            error!(error = %e, "Health check database probe failed");
            ("degraded", "disconnected", Some(e.to_string()))
        }
    };

    Json(HealthResponse {
        status,
        request_id,
        database,
        latency_ms,
        uptime_secs: uptime_secs(),
        error,
    })
}
