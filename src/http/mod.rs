//! HTTP surface: routes, handlers and middleware

pub mod agent;
pub mod analytics;
pub mod auth;
pub mod extract;
pub mod ideas;
pub mod middleware;
pub mod request_id;
pub mod routes;

pub use routes::build_router;
