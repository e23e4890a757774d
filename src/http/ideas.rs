//! Ideas CRUD, executed under the caller's JWT

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::extract::{parse_uuid, ValidJson, Validate};
use crate::app::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, FieldError};
use crate::store::ideas::{Idea, IdeaPatch, IdeaStatus, NewIdea};

pub const TITLE_MAX_LEN: usize = 200;

fn check_title(title: &mut String, errors: &mut Vec<FieldError>) {
    *title = title.trim().to_string();
    let len = title.chars().count();
    if len == 0 {
        errors.push(FieldError::new("title", "Title must not be empty"));
    } else if len > TITLE_MAX_LEN {
        errors.push(FieldError::new(
            "title",
            format!("Title must be {} characters or less", TITLE_MAX_LEN),
        ));
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateIdeaRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: IdeaStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Validate for CreateIdeaRequest {
    fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        check_title(&mut self.title, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateIdeaRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<IdeaStatus>,
    pub tags: Option<Vec<String>>,
}

impl Validate for UpdateIdeaRequest {
    fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Some(title) = self.title.as_mut() {
            check_title(title, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<UpdateIdeaRequest> for IdeaPatch {
    fn from(req: UpdateIdeaRequest) -> Self {
        IdeaPatch {
            title: req.title,
            description: req.description,
            status: req.status,
            tags: req.tags,
        }
    }
}

fn not_found(id: impl std::fmt::Display) -> ApiError {
    ApiError::NotFound(format!("Idea {} not found", id))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<Idea>>, ApiError> {
    let ideas = state
        .ideas
        .list(&user.access_token)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch ideas", &e))?;

    info!(user_id = %user.user_id, count = ideas.len(), "Fetched ideas");
    Ok(Json(ideas))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
) -> Result<Json<Idea>, ApiError> {
    let id = parse_uuid("idea_id", &raw_id)?;
    state
        .ideas
        .get(&user.access_token, id)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch idea", &e))?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidJson(req): ValidJson<CreateIdeaRequest>,
) -> Result<(StatusCode, Json<Idea>), ApiError> {
    let new_idea = NewIdea {
        user_id: user.user_id,
        title: req.title,
        description: Some(req.description),
        status: req.status,
        tags: req.tags,
    };

    let idea = state
        .ideas
        .create(&user.access_token, &new_idea)
        .await
        .map_err(|e| ApiError::upstream("Failed to create idea", &e))?;

    info!(user_id = %user.user_id, idea_id = %idea.id, "Created idea");
    Ok((StatusCode::CREATED, Json(idea)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
    ValidJson(req): ValidJson<UpdateIdeaRequest>,
) -> Result<Json<Idea>, ApiError> {
    let id = parse_uuid("idea_id", &raw_id)?;
    let patch = IdeaPatch::from(req);
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let idea = state
        .ideas
        .update(&user.access_token, id, user.user_id, &patch)
        .await
        .map_err(|e| ApiError::upstream("Failed to update idea", &e))?
        .ok_or_else(|| not_found(id))?;

    info!(user_id = %user.user_id, idea_id = %id, "Updated idea");
    Ok(Json(idea))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_uuid("idea_id", &raw_id)?;
    let deleted = state
        .ideas
        .delete(&user.access_token, id, user.user_id)
        .await
        .map_err(|e| ApiError::upstream("Failed to delete idea", &e))?;

    if !deleted {
        return Err(not_found(id));
    }
    info!(user_id = %user.user_id, idea_id = %id, "Deleted idea");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defaults_apply() {
        let mut req: CreateIdeaRequest = serde_json::from_str(r#"{"title":" Solar kettle "}"#).unwrap();
        req.validate().unwrap();
        assert_eq!(req.title, "Solar kettle");
        assert_eq!(req.description, "");
        assert_eq!(req.status, IdeaStatus::Draft);
        assert!(req.tags.is_empty());
    }

    #[test]
    fn titles_are_bounded() {
        let mut req: CreateIdeaRequest = serde_json::from_str(r#"{"title":""}"#).unwrap();
        assert_eq!(req.validate().unwrap_err()[0].field, "title");

        let long = format!(r#"{{"title":"{}"}}"#, "x".repeat(201));
        let mut req: CreateIdeaRequest = serde_json::from_str(&long).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn bad_status_fails_to_parse() {
        assert!(serde_json::from_str::<CreateIdeaRequest>(r#"{"title":"x","status":"deleted"}"#).is_err());
    }

    #[test]
    fn empty_update_is_empty_patch() {
        let req: UpdateIdeaRequest = serde_json::from_str("{}").unwrap();
        assert!(IdeaPatch::from(req).is_empty());

        let req: UpdateIdeaRequest = serde_json::from_str(r#"{"status":"archived"}"#).unwrap();
        assert_eq!(IdeaPatch::from(req).status, Some(IdeaStatus::Archived));
    }
}
