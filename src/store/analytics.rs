//! Dashboard aggregates, read from views that apply the caller's RLS scope

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ideas::IdeaStatus;
use super::supabase::{SupabaseClient, SupabaseError};

/// Ideas created on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsByDate {
    pub date: NaiveDate,
    pub count: i64,
}

/// Ideas per status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsByStatus {
    pub status: IdeaStatus,
    pub count: i64,
}

/// Most used tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagUsage {
    pub label: String,
    pub usage_count: i64,
}

#[derive(Clone)]
pub struct AnalyticsStore {
    client: SupabaseClient,
}

impl AnalyticsStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn items_by_date(&self, token: &str) -> Result<Vec<ItemsByDate>, SupabaseError> {
        self.client
            .as_user(token)?
            .select("items_by_date", "select=date,count")
            .await
    }

    pub async fn items_by_status(&self, token: &str) -> Result<Vec<ItemsByStatus>, SupabaseError> {
        self.client
            .as_user(token)?
            .select("items_by_status", "select=status,count")
            .await
    }

    pub async fn tags_usage(&self, token: &str) -> Result<Vec<TagUsage>, SupabaseError> {
        self.client
            .as_user(token)?
            .select("tags_usage", "select=label,usage_count")
            .await
    }
}
