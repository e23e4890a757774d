//! Rate limiting utilities

use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Global limiter for credential endpoints (signup, login)
#[derive(Clone)]
pub struct AuthLimiter {
    limiter: Arc<Limiter>,
}

impl AuthLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            limiter: create_limiter(requests_per_second),
        }
    }

    /// Check if another credential attempt is allowed (returns true if allowed)
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Entries kept before stale fingerprints are swept
const FLIGHT_SWEEP_THRESHOLD: usize = 1024;

/// Single-flight refreshes keyed by refresh token.
///
/// Every caller presenting the same refresh token within one window joins
/// the same cell, so the token is exchanged once and the outcome is shared.
/// Keys are SHA-256 fingerprints of the presented token.
pub struct RefreshFlights<T> {
    window: Duration,
    flights: Arc<DashMap<String, (Instant, Arc<OnceCell<T>>)>>,
}

impl<T> Clone for RefreshFlights<T> {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<T> RefreshFlights<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            flights: Arc::new(DashMap::new()),
        }
    }

    /// The cell for `refresh_token`, started fresh once the window has passed
    pub fn join(&self, refresh_token: &str) -> Arc<OnceCell<T>> {
        if self.flights.len() >= FLIGHT_SWEEP_THRESHOLD {
            let window = self.window;
            self.flights.retain(|_, (started, _)| started.elapsed() < window);
        }

        let mut entry = self
            .flights
            .entry(fingerprint(refresh_token))
            .or_insert_with(|| (Instant::now(), Arc::new(OnceCell::new())));
        if entry.0.elapsed() >= self.window {
            *entry = (Instant::now(), Arc::new(OnceCell::new()));
        }
        Arc::clone(&entry.1)
    }

    /// Drop `flight` so the next caller starts over. A newer flight for the
    /// same token is left alone.
    pub fn forget(&self, refresh_token: &str, flight: &Arc<OnceCell<T>>) {
        self.flights
            .remove_if(&fingerprint(refresh_token), |_, (_, current)| Arc::ptr_eq(current, flight));
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

/// Hex SHA-256 of a token
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
