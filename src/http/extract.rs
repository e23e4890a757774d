//! JSON body extraction with field validation

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{ApiError, FieldError};

/// Request bodies that check (and may normalize) their own fields
pub trait Validate {
    fn validate(&mut self) -> Result<(), Vec<FieldError>>;
}

/// `Json<T>` that answers malformed bodies and failed validation with the
/// standard 422 error instead of axum's plain-text rejection
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(mut value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;
        value.validate().map_err(ApiError::validation)?;
        Ok(Self(value))
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    ApiError::validation(vec![FieldError::new("body", rejection.body_text())])
}

/// Path segment that must be a UUID
pub fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::validation(vec![FieldError::new(field, "must be a valid UUID")]))
}
