//! Ideas table access, always under the caller's JWT so RLS decides visibility

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

/// Lifecycle of an idea
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdeaStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl IdeaStatus {
    pub const ALL: [IdeaStatus; 3] = [IdeaStatus::Draft, IdeaStatus::Published, IdeaStatus::Archived];

    pub fn as_str(self) -> &'static str {
        match self {
            IdeaStatus::Draft => "draft",
            IdeaStatus::Published => "published",
            IdeaStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdeaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdeaStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| "Invalid status. Must be one of: draft, published, archived".to_string())
    }
}

/// Idea row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: IdeaStatus,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// New idea for insertion
#[derive(Debug, Clone, Serialize)]
pub struct NewIdea {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: IdeaStatus,
    pub tags: Vec<String>,
}

/// Partial idea update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdeaPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IdeaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl IdeaPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.tags.is_none()
    }
}

/// Idea store operations
#[derive(Clone)]
pub struct IdeaStore {
    client: SupabaseClient,
}

impl IdeaStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Every idea the token's RLS policy exposes, newest first
    pub async fn list(&self, token: &str) -> Result<Vec<Idea>, SupabaseError> {
        self.client
            .as_user(token)?
            .select("ideas", "select=*&order=created_at.desc")
            .await
    }

    /// Filtered listing used by agent tools
    pub async fn list_filtered(
        &self,
        token: &str,
        owner: Uuid,
        status: Option<IdeaStatus>,
        limit: u32,
    ) -> Result<Vec<Idea>, SupabaseError> {
        let mut query = format!("user_id=eq.{}&select=*&order=created_at.desc&limit={}", owner, limit);
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status));
        }
        self.client.as_user(token)?.select("ideas", &query).await
    }

    /// Get a single idea by ID
    pub async fn get(&self, token: &str, id: Uuid) -> Result<Option<Idea>, SupabaseError> {
        let query = format!("id=eq.{}&select=*", id);
        self.client.as_user(token)?.select_one("ideas", &query).await
    }

    /// Ownership-checked lookup
    pub async fn get_owned(
        &self,
        token: &str,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<Idea>, SupabaseError> {
        let query = format!("id=eq.{}&user_id=eq.{}&select=*", id, owner);
        self.client.as_user(token)?.select_one("ideas", &query).await
    }

    /// Create a new idea
    pub async fn create(&self, token: &str, idea: &NewIdea) -> Result<Idea, SupabaseError> {
        let created: Vec<Idea> = self.client.as_user(token)?.insert("ideas", idea).await?;
        created.into_iter().next().ok_or(SupabaseError::NoRowReturned)
    }

    /// Update an idea owned by `owner`; `None` when nothing matched
    pub async fn update(
        &self,
        token: &str,
        id: Uuid,
        owner: Uuid,
        patch: &IdeaPatch,
    ) -> Result<Option<Idea>, SupabaseError> {
        let query = format!("id=eq.{}&user_id=eq.{}", id, owner);
        let updated: Vec<Idea> = self
            .client
            .as_user(token)?
            .update("ideas", &query, patch)
            .await?;
        Ok(updated.into_iter().next())
    }

    /// Delete an idea owned by `owner`; `false` when nothing matched
    pub async fn delete(&self, token: &str, id: Uuid, owner: Uuid) -> Result<bool, SupabaseError> {
        let query = format!("id=eq.{}&user_id=eq.{}", id, owner);
        let deleted: Vec<Idea> = self.client.as_user(token)?.delete("ideas", &query).await?;
        Ok(!deleted.is_empty())
    }
}
