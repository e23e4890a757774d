//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Deployment environment, drives cookie security attributes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "local" | "development" | "dev" | "test" => Ok(Environment::Local),
            other => Err(ConfigError::Invalid {
                name: "ENV",
                reason: format!("unknown environment '{}'", other),
            }),
        }
    }
}

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    pub environment: Environment,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase anonymous key, sent with GoTrue calls and user-scoped queries
    pub supabase_anon_key: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: String,
    /// Supabase JWT secret; when present access tokens are verified locally
    pub supabase_jwt_secret: Option<String>,
    pub supabase_timeout: Duration,
    pub supabase_retry_attempts: u32,
    pub supabase_retry_backoff: Duration,

    /// Base64-encoded 32 byte key for agent credential encryption
    pub encryption_key: String,
    pub agent_email_domain: String,

    /// Window in which one refresh token is exchanged at most once
    pub refresh_cooldown: Duration,
    pub auth_rate_limit_per_sec: u32,

    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        };

        let log_format = match optional("LOG_FORMAT").as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("pretty") | Some("text") => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: format!("expected 'json' or 'pretty', got '{}'", other),
                })
            }
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            environment: optional("ENV")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(Environment::Local),

            supabase_url: required("SUPABASE_URL")?.trim_end_matches('/').to_string(),
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            supabase_jwt_secret: optional("SUPABASE_JWT_SECRET"),
            supabase_timeout: Duration::from_secs(parse_or("SUPABASE_TIMEOUT_SECS", 10)?),
            supabase_retry_attempts: parse_or("SUPABASE_RETRY_ATTEMPTS", 3)?,
            supabase_retry_backoff: Duration::from_millis(parse_or(
                "SUPABASE_RETRY_BACKOFF_MS",
                500,
            )?),

            encryption_key: required("ENCRYPTION_KEY")?,
            agent_email_domain: optional("AGENT_EMAIL_DOMAIN")
                .unwrap_or_else(|| "code45.internal".to_string()),

            refresh_cooldown: Duration::from_secs(parse_or("REFRESH_COOLDOWN_SECS", 5)?),
            auth_rate_limit_per_sec: parse_or("AUTH_RATE_LIMIT_PER_SEC", 10)?,

            client_origin: optional("CLIENT_ORIGIN").unwrap_or_else(|| {
                "http://localhost:5173,http://127.0.0.1:5173".to_string()
            }),
        })
    }

    /// Configured CORS origins, trimmed, empty entries dropped
    pub fn cors_origins(&self) -> Vec<String> {
        self.client_origin
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}
