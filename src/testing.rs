//! Shared fixtures for unit tests

use std::time::Duration;

use crate::config::{Config, Environment, LogFormat};

/// 32 zero bytes, base64
pub const TEST_ENCRYPTION_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Local config pointing at `supabase_url`, with near-instant retries
pub fn config(supabase_url: &str) -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().expect("valid socket address"),
        log_level: "debug".to_string(),
        log_format: LogFormat::Pretty,
        environment: Environment::Local,
        supabase_url: supabase_url.trim_end_matches('/').to_string(),
        supabase_anon_key: "anon-key".to_string(),
        supabase_service_role_key: "service-role-key".to_string(),
        supabase_jwt_secret: None,
        supabase_timeout: Duration::from_secs(2),
        supabase_retry_attempts: 3,
        supabase_retry_backoff: Duration::from_millis(1),
        encryption_key: TEST_ENCRYPTION_KEY.to_string(),
        agent_email_domain: "code45.internal".to_string(),
        refresh_cooldown: Duration::from_secs(5),
        auth_rate_limit_per_sec: 1000,
        client_origin: "http://localhost:5173".to_string(),
    }
}
