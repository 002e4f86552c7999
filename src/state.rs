use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{
    ai::QuestionProvider, config::Config, services::generator::RetryPolicy,
    utils::rate_limit::{Action, RateLimiter},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    /// `None` when no AI key is configured; generation requests then fail with a validation error.
    pub provider: Option<Arc<dyn QuestionProvider>>,
    pub retry_policy: RetryPolicy,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config, provider: Option<Arc<dyn QuestionProvider>>) -> Self {
        Self {
            pool,
            config,
            provider,
            retry_policy: RetryPolicy::default(),
            limiter: Arc::new(RateLimiter::default()),
        }
    }

    /// Takes one token from `subject`'s bucket for `action`, or fails with a rate-limit error.
    pub fn check_rate(&self, action: Action, subject: &str) -> Result<(), crate::error::AppError> {
        self.limiter.check(action, subject)
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
