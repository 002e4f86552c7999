//! Scripted provider for exercising the generator without network calls.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::{CompletionRequest, ProviderError, QuestionProvider};

/// Replays queued replies in order; once the queue is empty every call gets the fallback.
pub struct MockProvider {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockProvider {
    /// Always answers with `content`.
    pub fn with_fixed_response(content: &str) -> Self {
        Self::scripted(Vec::new(), Ok(content.to_string()))
    }

    /// Always fails with a network error carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self::scripted(Vec::new(), Err(message.to_string()))
    }

    /// `Ok` entries are replies, `Err` entries become network errors.
    pub fn scripted(script: Vec<Result<String, String>>, fallback: Result<String, String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QuestionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| self.fallback.clone());

        next.map_err(ProviderError::NetworkError)
    }
}
