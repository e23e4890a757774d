//! Session handling around Supabase Auth: cookie policy, token checks,
//! and refresh during protected requests

pub mod cookies;
pub mod guard;
pub mod jwt;

pub use cookies::CookiePolicy;
pub use guard::{Authenticated, AuthenticatedUser, SessionGuard};
