//! Data store modules for Supabase integration

pub mod analytics;
pub mod gotrue;
pub mod ideas;
pub mod profiles;
pub mod supabase;
pub mod tags;

pub use analytics::AnalyticsStore;
pub use gotrue::{AuthUser, Session, SignUpOutcome};
pub use ideas::IdeaStore;
pub use profiles::ProfileStore;
pub use supabase::{SupabaseClient, SupabaseError};
pub use tags::TagStore;
