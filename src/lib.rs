//! Ideas API - cookie-session backend over Supabase
//!
//! Serves the ideas CRUD, analytics and agent tool endpoints used by the
//! dashboard. Auth and storage are delegated to Supabase (GoTrue and
//! PostgREST); every data call runs under the caller's JWT so row-level
//! security decides what is visible.

pub mod agent;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod store;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

pub use app::AppState;
pub use config::Config;
pub use http::build_router;
