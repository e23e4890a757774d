//! Supabase REST transport shared by the GoTrue and PostgREST wrappers

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, warn};

use crate::config::Config;

/// Retry schedule for transient Supabase failures
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Wait before retrying after failed attempt `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }
}

/// Supabase client for server-side auth and database operations.
///
/// Cheap to clone; every clone shares one connection pool.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
    retry: RetryPolicy,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> Result<Self, SupabaseError> {
        let client = Client::builder()
            .timeout(config.supabase_timeout)
            .build()
            .map_err(SupabaseError::Request)?;

        Ok(Self {
            client,
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
            retry: RetryPolicy {
                max_attempts: config.supabase_retry_attempts.max(1),
                initial_backoff: config.supabase_retry_backoff,
            },
        })
    }

    /// PostgREST handle using the service role key (bypasses RLS - handle with care!)
    pub fn service(&self) -> Rest<'_> {
        Rest {
            supabase: self,
            bearer: &self.service_role_key,
            api_key: &self.service_role_key,
        }
    }

    /// PostgREST handle bound to a user's JWT, so RLS policies apply
    pub fn as_user<'a>(&'a self, jwt: &'a str) -> Result<Rest<'a>, SupabaseError> {
        if jwt.is_empty() {
            return Err(SupabaseError::MissingToken);
        }
        Ok(Rest {
            supabase: self,
            bearer: jwt,
            api_key: &self.anon_key,
        })
    }

    /// Build a GoTrue request (`/auth/v1/{path}`) carrying the anon key
    pub(crate) fn auth_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/auth/v1/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
    }

    /// Send a request, retrying timeouts, connection failures and 503s
    /// with exponential backoff. Non-2xx answers become `SupabaseError::Api`.
    pub(crate) async fn send<F>(&self, operation: &str, build: F) -> Result<Response, SupabaseError>
    where
        F: Fn() -> RequestBuilder,
    {
        self.send_with(self.retry, operation, build).await
    }

    /// Send exactly once; for calls that must not be repeated (account creation)
    pub(crate) async fn send_once<F>(&self, operation: &str, build: F) -> Result<Response, SupabaseError>
    where
        F: Fn() -> RequestBuilder,
    {
        let once = RetryPolicy {
            max_attempts: 1,
            ..self.retry
        };
        self.send_with(once, operation, build).await
    }

    async fn send_with<F>(
        &self,
        policy: RetryPolicy,
        operation: &str,
        build: F,
    ) -> Result<Response, SupabaseError>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = build().send().await;

            let transient = match &outcome {
                Ok(response) => response.status() == StatusCode::SERVICE_UNAVAILABLE,
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if !transient || attempt >= max_attempts {
                if transient && max_attempts > 1 {
                    error!(operation, max_attempts, "Max retry attempts exceeded for Supabase call");
                }
                return match outcome {
                    Ok(response) => ensure_success(response).await,
                    Err(e) => Err(SupabaseError::Request(e)),
                };
            }

            let reason = match &outcome {
                Ok(response) => response.status().to_string(),
                Err(e) => e.to_string(),
            };
            let wait = policy.backoff_for(attempt);
            warn!(
                operation,
                attempt,
                max_attempts,
                backoff_ms = wait.as_millis() as u64,
                error = %reason,
                "Transient Supabase error, retrying"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, SupabaseError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(SupabaseError::Api {
        status: status.as_u16(),
        body,
    })
}

/// PostgREST access under one credential
#[derive(Clone, Copy)]
pub struct Rest<'a> {
    supabase: &'a SupabaseClient,
    bearer: &'a str,
    api_key: &'a str,
}

impl<'a> Rest<'a> {
    /// Get the REST API URL for a table, with an optional query string
    fn url(&self, table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}/rest/v1/{}", self.supabase.base_url, table)
        } else {
            format!("{}/rest/v1/{}?{}", self.supabase.base_url, table, query)
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.supabase
            .client
            .request(method, url)
            .header("apikey", self.api_key)
            .header("Authorization", format!("Bearer {}", self.bearer))
            .header("Content-Type", "application/json")
    }

    /// Select rows matching a PostgREST query string
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, SupabaseError> {
        let url = self.url(table, query);
        let response = self
            .supabase
            .send("select", || self.request(Method::GET, &url))
            .await?;
        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Select expecting at most a single row
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, SupabaseError> {
        let url = self.url(table, query);
        let outcome = self
            .supabase
            .send("select_one", || {
                self.request(Method::GET, &url)
                    .header("Accept", "application/vnd.pgrst.object+json")
            })
            .await;

        match outcome {
            Ok(response) => response.json().await.map(Some).map_err(SupabaseError::Parse),
            // No rows found
            Err(SupabaseError::Api { status: 406, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Insert a row and return the stored representation(s)
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<Vec<R>, SupabaseError> {
        let url = self.url(table, "");
        let response = self
            .supabase
            .send("insert", || {
                self.request(Method::POST, &url)
                    .header("Prefer", "return=representation")
                    .json(data)
            })
            .await?;
        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Update matching rows and return them
    pub async fn update<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<Vec<R>, SupabaseError> {
        let url = self.url(table, query);
        let response = self
            .supabase
            .send("update", || {
                self.request(Method::PATCH, &url)
                    .header("Prefer", "return=representation")
                    .json(data)
            })
            .await?;
        response.json().await.map_err(SupabaseError::Parse)
    }

    /// Delete matching rows and return them
    pub async fn delete<R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<R>, SupabaseError> {
        let url = self.url(table, query);
        let response = self
            .supabase
            .send("delete", || {
                self.request(Method::DELETE, &url)
                    .header("Prefer", "return=representation")
            })
            .await?;
        response.json().await.map_err(SupabaseError::Parse)
    }
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No row returned")]
    NoRowReturned,

    #[error("A user access token is required")]
    MissingToken,
}

impl SupabaseError {
    /// HTTP status Supabase answered with, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            SupabaseError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message from a GoTrue/PostgREST error body
    pub fn vendor_message(&self) -> String {
        match self {
            SupabaseError::Api { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|value| {
                    ["msg", "error_description", "message", "error"]
                        .iter()
                        .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(String::from))
                })
                .unwrap_or_else(|| body.clone()),
            other => other.to_string(),
        }
    }
}
