// src/utils/rate_limit.rs

use std::{
    num::NonZeroU32,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use axum::http::Request;
use governor::{DefaultKeyedRateLimiter, Quota};
use tower_governor::{GovernorError, key_extractor::KeyExtractor};

use crate::{
    config::{
        AI_GENERATE_LIMIT_PER_MINUTE, AI_SAVE_LIMIT_PER_MINUTE, LOGIN_LIMIT_PER_MINUTE,
        REGISTER_LIMIT_PER_MINUTE,
    },
    error::AppError,
    utils::jwt::Claims,
};

/// Stale keys are pruned after this many checks.
const SWEEP_EVERY: u64 = 1024;

/// The rate-limited actions. Each has its own per-minute allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Register,
    Login,
    AiGenerate,
    AiSave,
}

impl Action {
    pub fn per_minute(self) -> u32 {
        match self {
            Action::Register => REGISTER_LIMIT_PER_MINUTE,
            Action::Login => LOGIN_LIMIT_PER_MINUTE,
            Action::AiGenerate => AI_GENERATE_LIMIT_PER_MINUTE,
            Action::AiSave => AI_SAVE_LIMIT_PER_MINUTE,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Action::Register => "register",
            Action::Login => "login",
            Action::AiGenerate => "ai_generate",
            Action::AiSave => "ai_save",
        }
    }
}

/// Token buckets per action, keyed by subject (a username or a user id).
///
/// A bucket holds a full minute's allowance and refills one token every
/// `window / limit`. Buckets that have refilled completely are dropped on the
/// periodic sweep, so unknown usernames cannot grow the store without bound.
pub struct RateLimiter {
    register: DefaultKeyedRateLimiter<String>,
    login: DefaultKeyedRateLimiter<String>,
    ai_generate: DefaultKeyedRateLimiter<String>,
    ai_save: DefaultKeyedRateLimiter<String>,
    checks: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_window(Duration::from_secs(60))
    }
}

impl RateLimiter {
    /// Limits apply per `window` instead of per minute.
    pub fn with_window(window: Duration) -> Self {
        let keyed = |action: Action| DefaultKeyedRateLimiter::keyed(quota(action.per_minute(), window));
        Self {
            register: keyed(Action::Register),
            login: keyed(Action::Login),
            ai_generate: keyed(Action::AiGenerate),
            ai_save: keyed(Action::AiSave),
            checks: AtomicU64::new(0),
        }
    }

    fn bucket(&self, action: Action) -> &DefaultKeyedRateLimiter<String> {
        match action {
            Action::Register => &self.register,
            Action::Login => &self.login,
            Action::AiGenerate => &self.ai_generate,
            Action::AiSave => &self.ai_save,
        }
    }

    /// Takes one token from `subject`'s bucket for `action`.
    pub fn check(&self, action: Action, subject: &str) -> Result<(), AppError> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }

        if self.bucket(action).check_key(&subject.to_string()).is_err() {
            tracing::warn!("Rate limit exceeded action={} subject={}", action.label(), subject);
            return Err(AppError::RateLimit(
                "Too many requests, please wait a minute and try again".to_string(),
            ));
        }
        Ok(())
    }

    /// Drops every bucket that is back to full.
    pub fn sweep(&self) {
        for limiter in [&self.register, &self.login, &self.ai_generate, &self.ai_save] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of buckets currently held across all actions.
    pub fn tracked_keys(&self) -> usize {
        [&self.register, &self.login, &self.ai_generate, &self.ai_save]
            .iter()
            .map(|limiter| limiter.len())
            .sum()
    }
}

/// `limit` tokens per `window`, all available at once. A zero limit is treated as one.
pub fn quota(limit: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(window / burst.get())
        .unwrap_or_else(|| Quota::per_minute(burst))
        .allow_burst(burst)
}

/// Milliseconds between refills for the per-user request cap.
pub fn refill_millis(per_minute: u32) -> u64 {
    (60_000 / u64::from(per_minute.max(1))).max(1)
}

/// Keys the per-user request cap by the authenticated user.
///
/// The governor layer using it must sit inside `auth_middleware`.
#[derive(Debug, Clone, Copy)]
pub struct UserKeyExtractor;

impl KeyExtractor for UserKeyExtractor {
    type Key = String;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        req.extensions()
            .get::<Claims>()
            .map(|claims| claims.sub.clone())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    #[test]
    fn blocks_after_limit_within_window() {
        let limiter = RateLimiter::default();
        for _ in 0..REGISTER_LIMIT_PER_MINUTE {
            assert!(limiter.check(Action::Register, "bob").is_ok());
        }
        assert!(matches!(
            limiter.check(Action::Register, "bob"),
            Err(AppError::RateLimit(_))
        ));
        // separate subjects and actions are counted separately
        assert!(limiter.check(Action::Register, "carol").is_ok());
        assert!(limiter.check(Action::Login, "bob").is_ok());
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = RateLimiter::with_window(Duration::from_millis(50));
        for _ in 0..AI_SAVE_LIMIT_PER_MINUTE {
            assert!(limiter.check(Action::AiSave, "7").is_ok());
        }
        assert!(limiter.check(Action::AiSave, "7").is_err());
        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.check(Action::AiSave, "7").is_ok());
    }

    #[test]
    fn sweep_drops_refilled_buckets() {
        let limiter = RateLimiter::with_window(Duration::from_millis(10));
        for n in 0..5_000 {
            let _ = limiter.check(Action::Login, &format!("user{}", n));
        }
        assert!(limiter.tracked_keys() > 0);

        std::thread::sleep(Duration::from_millis(30));
        limiter.sweep();
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn zero_limit_still_allows_one() {
        let q = quota(0, Duration::from_secs(60));
        assert_eq!(q.burst_size().get(), 1);
        assert_eq!(refill_millis(0), 60_000);
        assert_eq!(refill_millis(60), 1_000);
        assert_eq!(refill_millis(1_000_000), 1);
    }

    #[test]
    fn user_key_comes_from_claims() {
        let mut req = Request::new(());
        assert!(UserKeyExtractor.extract(&req).is_err());

        req.extensions_mut().insert(Claims {
            sub: "42".to_string(),
            username: "teach".to_string(),
            role: Role::Teacher,
            exp: 0,
        });
        assert_eq!(UserKeyExtractor.extract(&req).unwrap(), "42");
    }
}
