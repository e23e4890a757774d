//! `user_profiles` access with the service role

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

/// Profile store operations
#[derive(Clone)]
pub struct ProfileStore {
    client: SupabaseClient,
}

impl ProfileStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Cheapest query that proves the database answers
    pub async fn probe(&self) -> Result<(), SupabaseError> {
        let _: Vec<Value> = self
            .client
            .service()
            .select("user_profiles", "select=id&limit=1")
            .await?;
        Ok(())
    }

    /// Stamp the moment a user's agent last authenticated
    pub async fn touch_agent_last_used(&self, user_id: Uuid) -> Result<(), SupabaseError> {
        #[derive(Serialize)]
        struct AgentLastUsed {
            agent_last_used_at: chrono::DateTime<Utc>,
        }

        let query = format!("id=eq.{}", user_id);
        let _: Vec<Value> = self
            .client
            .service()
            .update(
                "user_profiles",
                &query,
                &AgentLastUsed {
                    agent_last_used_at: Utc::now(),
                },
            )
            .await?;
        Ok(())
    }
}
