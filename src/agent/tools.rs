//! Tools an agent-user may run against the caller's data
//!
//! Each tool runs under the agent session's JWT, so RLS still decides what
//! is visible. Failures are returned as data (`success: false` plus an
//! `error_code`) rather than as HTTP errors.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::ideas::{IdeaStatus, NewIdea};
use crate::store::{IdeaStore, SupabaseError, TagStore};

pub const TAG_NAME_MAX_LEN: usize = 50;
pub const TITLE_MAX_LEN: usize = 200;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const MAX_SEARCH_LIMIT: u32 = 50;
pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentTool {
    CreateTag,
    SearchTags,
    LinkTagToIdea,
    CreateIdea,
    ListIdeas,
}

impl AgentTool {
    pub const ALL: [AgentTool; 5] = [
        AgentTool::CreateTag,
        AgentTool::SearchTags,
        AgentTool::LinkTagToIdea,
        AgentTool::CreateIdea,
        AgentTool::ListIdeas,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentTool::CreateTag => "create_tag",
            AgentTool::SearchTags => "search_tags",
            AgentTool::LinkTagToIdea => "link_tag_to_idea",
            AgentTool::CreateIdea => "create_idea",
            AgentTool::ListIdeas => "list_ideas",
        }
    }
}

impl fmt::Display for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentTool {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentTool::ALL.into_iter().find(|tool| tool.as_str() == s).ok_or(())
    }
}

/// A tool failure, reported to the caller as data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub code: &'static str,
    pub message: String,
}

impl ToolFailure {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn database(err: &SupabaseError) -> Self {
        error!(error = %err, status = ?err.status(), "Tool database call failed");
        Self::new("DATABASE_ERROR", "Database operation failed")
    }
}

pub type ToolResult = Result<Map<String, Value>, ToolFailure>;

/// Response body for a tool outcome
pub fn render(result: ToolResult) -> Value {
    match result {
        Ok(mut body) => {
            body.insert("success".to_string(), Value::Bool(true));
            Value::Object(body)
        }
        Err(failure) => json!({
            "success": false,
            "error": failure.message,
            "error_code": failure.code,
        }),
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Trimmed, lowercased tag name of 1-50 chars from `[a-z0-9_-]`
pub fn normalize_tag_name(raw: &str) -> Result<String, ToolFailure> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(ToolFailure::new("INVALID_TAG_NAME", "tag_name must be a non-empty string"));
    }
    if name.chars().count() > TAG_NAME_MAX_LEN {
        return Err(ToolFailure::new(
            "TAG_NAME_TOO_LONG",
            format!("tag_name must be {} characters or less", TAG_NAME_MAX_LEN),
        ));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid {
        return Err(ToolFailure::new(
            "INVALID_TAG_FORMAT",
            "tag_name may only contain lowercase letters, numbers, hyphens and underscores",
        ));
    }
    Ok(name)
}

/// Valid tag names only, normalized; invalid ones are dropped
pub fn clean_tags(raw: &[String]) -> Vec<String> {
    raw.iter()
        .filter_map(|tag| normalize_tag_name(tag).ok())
        .collect()
}

pub fn clamp_limit(requested: Option<i64>, default: u32, max: u32) -> u32 {
    match requested {
        None => default,
        Some(n) if n < 1 => 1,
        Some(n) => n.min(max as i64) as u32,
    }
}

pub fn validate_title(raw: &str) -> Result<String, ToolFailure> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ToolFailure::new("INVALID_TITLE", "title must be a non-empty string"));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(ToolFailure::new(
            "TITLE_TOO_LONG",
            format!("title must be {} characters or less", TITLE_MAX_LEN),
        ));
    }
    Ok(title.to_string())
}

fn parse_status(raw: Option<&str>) -> Result<Option<IdeaStatus>, ToolFailure> {
    raw.map(|s| s.parse::<IdeaStatus>())
        .transpose()
        .map_err(|message| ToolFailure::new("INVALID_STATUS", message))
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolFailure> {
    serde_json::from_value(args).map_err(|e| ToolFailure::new("INVALID_ARGUMENTS", e.to_string()))
}

/// Postgres unique violations surface from PostgREST as 409
fn is_conflict(err: &SupabaseError) -> bool {
    if err.status() == Some(409) {
        return true;
    }
    let message = err.vendor_message().to_lowercase();
    message.contains("duplicate") || message.contains("unique")
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateTagArgs {
    tag_name: String,
    #[serde(default, alias = "idea_id")]
    item_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct SearchTagsArgs {
    #[serde(default)]
    query: String,
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LinkTagArgs {
    tag_id: i64,
    idea_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct CreateIdeaArgs {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ListIdeasArgs {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

// =============================================================================
// Execution
// =============================================================================

/// Stores and identity a tool runs with
pub struct ToolContext<'a> {
    pub ideas: &'a IdeaStore,
    pub tags: &'a TagStore,
    /// Agent session JWT
    pub token: &'a str,
    /// The human user the agent acts for
    pub owner: Uuid,
}

pub async fn run(tool: AgentTool, args: Value, ctx: &ToolContext<'_>) -> ToolResult {
    let result = match tool {
        AgentTool::CreateTag => create_tag(parse_args(args)?, ctx).await,
        AgentTool::SearchTags => search_tags(parse_args(args)?, ctx).await,
        AgentTool::LinkTagToIdea => link_tag_to_idea(parse_args(args)?, ctx).await,
        AgentTool::CreateIdea => create_idea(parse_args(args)?, ctx).await,
        AgentTool::ListIdeas => list_ideas(parse_args(args)?, ctx).await,
    };

    match &result {
        Ok(_) => info!(tool = %tool, user_id = %ctx.owner, "Tool succeeded"),
        Err(failure) => warn!(tool = %tool, user_id = %ctx.owner, code = failure.code, "Tool failed"),
    }
    result
}

async fn create_tag(args: CreateTagArgs, ctx: &ToolContext<'_>) -> ToolResult {
    let name = normalize_tag_name(&args.tag_name)?;

    if let Some(idea_id) = args.item_id {
        let idea = ctx
            .ideas
            .get(ctx.token, idea_id)
            .await
            .map_err(|e| ToolFailure::database(&e))?;
        if idea.is_none() {
            return Err(ToolFailure::new(
                "ITEM_NOT_FOUND",
                format!("Item with ID {} not found or access denied", idea_id),
            ));
        }
    }

    let tag = ctx
        .tags
        .create(ctx.token, &name, ctx.owner)
        .await
        .map_err(|e| {
            if is_conflict(&e) {
                ToolFailure::new("DUPLICATE_TAG", format!("Tag '{}' already exists", name))
            } else {
                ToolFailure::database(&e)
            }
        })?;

    let mut body = Map::new();
    let mut linked = false;
    if let Some(idea_id) = args.item_id {
        match ctx.tags.link(ctx.token, tag.id, idea_id).await {
            Ok(_) => linked = true,
            Err(e) => {
                warn!(tag_id = tag.id, idea_id = %idea_id, error = %e, "Tag created but linking failed");
                body.insert("warning".into(), json!("Tag created but could not be linked to the item"));
            }
        }
        body.insert("item_id".into(), json!(idea_id));
    }

    body.insert("linked".into(), json!(linked));
    body.insert("tag".into(), json!(tag));
    Ok(body)
}

async fn search_tags(args: SearchTagsArgs, ctx: &ToolContext<'_>) -> ToolResult {
    let limit = clamp_limit(args.limit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT);
    let query = args.query.trim().to_lowercase();

    let tags = ctx
        .tags
        .search(ctx.token, &query, ctx.owner, limit)
        .await
        .map_err(|e| ToolFailure::database(&e))?;

    let mut body = Map::new();
    body.insert("count".into(), json!(tags.len()));
    body.insert("data".into(), json!(tags));
    Ok(body)
}

async fn link_tag_to_idea(args: LinkTagArgs, ctx: &ToolContext<'_>) -> ToolResult {
    let tag = ctx
        .tags
        .find_owned(ctx.token, args.tag_id, ctx.owner)
        .await
        .map_err(|e| ToolFailure::database(&e))?
        .ok_or_else(|| {
            ToolFailure::new(
                "TAG_NOT_FOUND",
                format!("Tag with ID {} not found or access denied", args.tag_id),
            )
        })?;

    let idea = ctx
        .ideas
        .get_owned(ctx.token, args.idea_id, ctx.owner)
        .await
        .map_err(|e| ToolFailure::database(&e))?
        .ok_or_else(|| {
            ToolFailure::new(
                "IDEA_NOT_FOUND",
                format!("Idea with ID {} not found or access denied", args.idea_id),
            )
        })?;

    let already_linked = ctx
        .tags
        .link_exists(ctx.token, tag.id, idea.id)
        .await
        .map_err(|e| ToolFailure::database(&e))?;

    let mut body = Map::new();
    if already_linked {
        body.insert("already_linked".into(), json!(true));
        body.insert(
            "message".into(),
            json!(format!("Tag '{}' is already linked to idea '{}'", tag.name, idea.title)),
        );
        return Ok(body);
    }

    let link = ctx
        .tags
        .link(ctx.token, tag.id, idea.id)
        .await
        .map_err(|e| {
            if is_conflict(&e) {
                ToolFailure::new("ALREADY_LINKED", "Tag is already linked to this idea")
            } else {
                ToolFailure::database(&e)
            }
        })?;

    body.insert("already_linked".into(), json!(false));
    body.insert(
        "message".into(),
        json!(format!("Successfully linked tag '{}' to idea '{}'", tag.name, idea.title)),
    );
    body.insert("link".into(), json!(link));
    Ok(body)
}

async fn create_idea(args: CreateIdeaArgs, ctx: &ToolContext<'_>) -> ToolResult {
    let title = validate_title(&args.title)?;
    let status = parse_status(args.status.as_deref())?.unwrap_or_default();

    let new_idea = NewIdea {
        user_id: ctx.owner,
        title,
        description: Some(args.description.unwrap_or_default()),
        status,
        tags: clean_tags(&args.tags),
    };

    let idea = ctx
        .ideas
        .create(ctx.token, &new_idea)
        .await
        .map_err(|e| ToolFailure::database(&e))?;

    let mut body = Map::new();
    body.insert("data".into(), json!(idea));
    Ok(body)
}

async fn list_ideas(args: ListIdeasArgs, ctx: &ToolContext<'_>) -> ToolResult {
    let status = parse_status(args.status.as_deref())?;
    let limit = clamp_limit(args.limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);

    let ideas = ctx
        .ideas
        .list_filtered(ctx.token, ctx.owner, status, limit)
        .await
        .map_err(|e| ToolFailure::database(&e))?;

    let mut body = Map::new();
    body.insert("count".into(), json!(ideas.len()));
    body.insert("data".into(), json!(ideas));
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_parse() {
        for tool in AgentTool::ALL {
            assert_eq!(tool.as_str().parse::<AgentTool>(), Ok(tool));
        }
        assert!("drop_tables".parse::<AgentTool>().is_err());
    }

    #[test]
    fn tag_names_are_normalized() {
        assert_eq!(normalize_tag_name("  Rust-Lang ").unwrap(), "rust-lang");
        assert_eq!(normalize_tag_name("snake_case_2").unwrap(), "snake_case_2");
    }

    #[test]
    fn tag_name_failures_carry_codes() {
        assert_eq!(normalize_tag_name("   ").unwrap_err().code, "INVALID_TAG_NAME");
        assert_eq!(normalize_tag_name(&"a".repeat(51)).unwrap_err().code, "TAG_NAME_TOO_LONG");
        assert_eq!(normalize_tag_name("has space").unwrap_err().code, "INVALID_TAG_FORMAT");
        assert_eq!(normalize_tag_name("émoji").unwrap_err().code, "INVALID_TAG_FORMAT");
        assert!(normalize_tag_name(&"a".repeat(50)).is_ok());
    }

    #[test]
    fn invalid_tags_are_dropped() {
        let raw = vec!["Good".to_string(), "bad tag".to_string(), "".to_string(), "ok-2".to_string()];
        assert_eq!(clean_tags(&raw), vec!["good", "ok-2"]);
    }

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(None, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT), 10);
        assert_eq!(clamp_limit(Some(0), DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT), 1);
        assert_eq!(clamp_limit(Some(-5), DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT), 1);
        assert_eq!(clamp_limit(Some(25), DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT), 25);
        assert_eq!(clamp_limit(Some(500), DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT), 50);
    }

    #[test]
    fn titles_are_trimmed_and_bounded() {
        assert_eq!(validate_title("  Solar kettle ").unwrap(), "Solar kettle");
        assert_eq!(validate_title(" ").unwrap_err().code, "INVALID_TITLE");
        assert_eq!(validate_title(&"x".repeat(201)).unwrap_err().code, "TITLE_TOO_LONG");
    }

    #[test]
    fn bad_status_is_reported() {
        assert_eq!(parse_status(Some("deleted")).unwrap_err().code, "INVALID_STATUS");
        assert_eq!(parse_status(Some("archived")).unwrap(), Some(IdeaStatus::Archived));
        assert_eq!(parse_status(None).unwrap(), None);
    }

    #[test]
    fn create_tag_accepts_either_idea_key() {
        let args: CreateTagArgs =
            parse_args(json!({ "tag_name": "x", "idea_id": "0d7f6b8e-5f1a-4c1e-8a0e-9d8a1b2c3d4e" })).unwrap();
        assert!(args.item_id.is_some());
        let args: CreateTagArgs =
            parse_args(json!({ "tag_name": "x", "item_id": "0d7f6b8e-5f1a-4c1e-8a0e-9d8a1b2c3d4e" })).unwrap();
        assert!(args.item_id.is_some());
        assert_eq!(
            parse_args::<CreateTagArgs>(json!({})).unwrap_err().code,
            "INVALID_ARGUMENTS"
        );
    }

    #[test]
    fn render_marks_success() {
        let mut body = Map::new();
        body.insert("count".into(), json!(0));
        assert_eq!(render(Ok(body)), json!({ "count": 0, "success": true }));

        let failure = ToolFailure::new("DUPLICATE_TAG", "Tag 'x' already exists");
        assert_eq!(
            render(Err(failure)),
            json!({ "success": false, "error": "Tag 'x' already exists", "error_code": "DUPLICATE_TAG" })
        );
    }
}
