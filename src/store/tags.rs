//! Tags and the idea_tags junction table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

/// Tag row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
struct NewTag<'a> {
    name: &'a str,
    user_id: Uuid,
}

/// Junction row linking a tag to an idea
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaTag {
    #[serde(default)]
    pub id: Option<i64>,
    pub idea_id: Uuid,
    pub tag_id: i64,
}

/// Tag store operations
#[derive(Clone)]
pub struct TagStore {
    client: SupabaseClient,
}

impl TagStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, token: &str, name: &str, owner: Uuid) -> Result<Tag, SupabaseError> {
        let created: Vec<Tag> = self
            .client
            .as_user(token)?
            .insert("tags", &NewTag { name, user_id: owner })
            .await?;
        created.into_iter().next().ok_or(SupabaseError::NoRowReturned)
    }

    /// Case-insensitive substring search over the owner's tags
    pub async fn search(
        &self,
        token: &str,
        pattern: &str,
        owner: Uuid,
        limit: u32,
    ) -> Result<Vec<Tag>, SupabaseError> {
        let query = format!(
            "select=id,name,user_id,created_at&name=ilike.*{}*&user_id=eq.{}&limit={}",
            urlencoding::encode(pattern),
            owner,
            limit
        );
        self.client.as_user(token)?.select("tags", &query).await
    }

    pub async fn find_owned(
        &self,
        token: &str,
        tag_id: i64,
        owner: Uuid,
    ) -> Result<Option<Tag>, SupabaseError> {
        let query = format!("id=eq.{}&user_id=eq.{}", tag_id, owner);
        self.client.as_user(token)?.select_one("tags", &query).await
    }

    pub async fn link_exists(
        &self,
        token: &str,
        tag_id: i64,
        idea_id: Uuid,
    ) -> Result<bool, SupabaseError> {
        let query = format!("tag_id=eq.{}&idea_id=eq.{}", tag_id, idea_id);
        let links: Vec<IdeaTag> = self.client.as_user(token)?.select("idea_tags", &query).await?;
        Ok(!links.is_empty())
    }

    pub async fn link(&self, token: &str, tag_id: i64, idea_id: Uuid) -> Result<IdeaTag, SupabaseError> {
        #[derive(Serialize)]
        struct NewLink {
            idea_id: Uuid,
            tag_id: i64,
        }

        let created: Vec<IdeaTag> = self
            .client
            .as_user(token)?
            .insert("idea_tags", &NewLink { idea_id, tag_id })
            .await?;
        created.into_iter().next().ok_or(SupabaseError::NoRowReturned)
    }
}
