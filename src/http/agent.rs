//! Agent tool endpoint

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{Map, Value};
use tracing::info;

use crate::agent::tools::{self, AgentTool, ToolContext};
use crate::app::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, FieldError};

/// Tool arguments: a JSON object, or an empty body for no arguments
fn parse_args(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(ApiError::validation(vec![FieldError::new(
            "body",
            "Tool arguments must be a JSON object",
        )])),
        Err(e) => Err(ApiError::validation(vec![FieldError::new("body", e.to_string())])),
    }
}

/// Run a tool under the caller's agent-user session
pub async fn run_tool(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let tool: AgentTool = name
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Unknown tool '{}'", name)))?;
    let args = parse_args(&body)?;

    let session = state.agents.authenticate(user.user_id).await?;
    info!(
        user_id = %user.user_id,
        agent_user_id = %session.agent_user_id,
        tool = %tool,
        "Running agent tool"
    );

    let ctx = ToolContext {
        ideas: &state.ideas,
        tags: &state.tags,
        token: &session.access_token,
        owner: user.user_id,
    };
    let result = tools::run(tool, args, &ctx).await;
    Ok(Json(tools::render(result)))
}
