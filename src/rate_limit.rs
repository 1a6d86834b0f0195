//! Rate limiting for login attempts.
//!
//! Uses a token bucket per contact identifier (email or phone) so repeated
//! password guesses against one account are throttled wherever they come from.
//! A second bucket per resolved account covers switching between the email
//! and the phone of the same user.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Keyed limiter over normalized contact identifiers.
pub type ContactLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_MINUTE: NonZeroU32 = NonZeroU32::new(6).unwrap();
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Login attempts per identifier (5 quickly, then one every 10 seconds)
    pub login: Arc<ContactLimiter>,
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::with_login_quota(Quota::per_minute(LOGIN_PER_MINUTE).allow_burst(LOGIN_BURST))
    }

    pub fn with_login_quota(quota: Quota) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Record a login attempt for `identifier`. Returns false when throttled.
    pub fn check_login(&self, identifier: &str) -> bool {
        self.login
            .check_key(&identifier.trim().to_lowercase())
            .is_ok()
    }

    /// Record a login attempt against an existing account. Returns false when throttled.
    pub fn check_account(&self, user_id: &str) -> bool {
        self.login.check_key(&format!("account:{}", user_id)).is_ok()
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}
