//! Dashboard analytics endpoints

use axum::{
    extract::{Extension, State},
    Json,
};

use crate::app::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::store::analytics::{ItemsByDate, ItemsByStatus, TagUsage};

pub async fn items_by_date(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ItemsByDate>>, ApiError> {
    state
        .analytics
        .items_by_date(&user.access_token)
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream("Failed to fetch analytics", &e))
}

pub async fn items_by_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ItemsByStatus>>, ApiError> {
    state
        .analytics
        .items_by_status(&user.access_token)
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream("Failed to fetch analytics", &e))
}

pub async fn tags_usage(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<TagUsage>>, ApiError> {
    state
        .analytics
        .tags_usage(&user.access_token)
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream("Failed to fetch analytics", &e))
}
