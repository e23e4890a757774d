//! Application state shared across routes

use std::sync::Arc;

use crate::agent::{AgentCredentialStore, AgentService, CipherError, CredentialCipher};
use crate::auth::{CookiePolicy, SessionGuard};
use crate::config::Config;
use crate::store::{AnalyticsStore, IdeaStore, ProfileStore, SupabaseClient, SupabaseError, TagStore};
use crate::util::rate_limit::{AuthLimiter, RefreshFlights};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to build Supabase client: {0}")]
    Supabase(#[from] SupabaseError),

    #[error("Invalid ENCRYPTION_KEY: {0}")]
    Cipher(#[from] CipherError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub supabase: SupabaseClient,
    pub cookies: CookiePolicy,
    pub guard: SessionGuard,
    pub auth_limiter: AuthLimiter,
    pub ideas: IdeaStore,
    pub tags: TagStore,
    pub analytics: AnalyticsStore,
    pub profiles: ProfileStore,
    pub agents: AgentService,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, StateError> {
        let config = Arc::new(config);

        let supabase = SupabaseClient::new(&config)?;

        // Stores
        let ideas = IdeaStore::new(supabase.clone());
        let tags = TagStore::new(supabase.clone());
        let analytics = AnalyticsStore::new(supabase.clone());
        let profiles = ProfileStore::new(supabase.clone());

        // Session handling
        let cookies = CookiePolicy::for_environment(config.environment);
        let guard = SessionGuard::new(
            supabase.clone(),
            config.supabase_jwt_secret.clone(),
            RefreshFlights::new(config.refresh_cooldown),
        );
        let auth_limiter = AuthLimiter::new(config.auth_rate_limit_per_sec);

        // Agent-users
        let cipher = CredentialCipher::from_base64(&config.encryption_key)?;
        let agents = AgentService::new(
            supabase.clone(),
            AgentCredentialStore::new(cipher),
            profiles.clone(),
            config.agent_email_domain.clone(),
        );

        Ok(Self {
            config,
            supabase,
            cookies,
            guard,
            auth_limiter,
            ideas,
            tags,
            analytics,
            profiles,
            agents,
        })
    }
}
