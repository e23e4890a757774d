//! httpOnly cookie policy for the session tokens

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use super::jwt::extract_bearer_token;
use crate::config::Environment;
use crate::store::Session;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// The refresh cookie outlives the access cookie by this factor
const REFRESH_LIFETIME_FACTOR: u64 = 24;

/// Cookie attributes for the current environment.
///
/// Production serves the SPA from another origin, so cookies there must be
/// `Secure; SameSite=None`; local development runs over plain HTTP with `Lax`.
#[derive(Clone, Copy, Debug)]
pub struct CookiePolicy {
    secure: bool,
    same_site: SameSite,
}

impl CookiePolicy {
    pub fn for_environment(environment: Environment) -> Self {
        if environment.is_production() {
            Self {
                secure: true,
                same_site: SameSite::None,
            }
        } else {
            Self {
                secure: false,
                same_site: SameSite::Lax,
            }
        }
    }

    fn cookie(&self, name: &'static str, value: String, max_age_secs: u64) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(Duration::seconds(max_age_secs.min(i64::MAX as u64) as i64))
            .build()
    }

    /// Add both session cookies for a freshly issued session
    pub fn set_session(&self, jar: CookieJar, session: &Session) -> CookieJar {
        let expires_in = session.expires_in_secs();
        jar.add(self.cookie(ACCESS_TOKEN_COOKIE, session.access_token.clone(), expires_in))
            .add(self.cookie(
                REFRESH_TOKEN_COOKIE,
                session.refresh_token.clone(),
                expires_in.saturating_mul(REFRESH_LIFETIME_FACTOR),
            ))
    }

    /// Overwrite both session cookies with empty, immediately expiring values
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.cookie(ACCESS_TOKEN_COOKIE, String::new(), 0))
            .add(self.cookie(REFRESH_TOKEN_COOKIE, String::new(), 0))
    }
}

/// Access token from the `access_token` cookie, else `Authorization: Bearer`
pub fn access_token_from(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .map(String::from)
}

/// Refresh token from its cookie
pub fn refresh_token_from(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
