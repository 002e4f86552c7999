//! Text-generation providers used to draft questions.
//!
//! The generator service only sees the `QuestionProvider` trait; the HTTP client
//! and the scripted test double live behind it.

pub mod error;
pub mod mock;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AiConfig, GROQ_BASE_URL, OPENAI_BASE_URL};

pub use error::ProviderError;
pub use mock::MockProvider;
pub use openai::OpenAiCompatibleProvider;

/// A system+user prompt pair sent to a chat-style model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[async_trait]
pub trait QuestionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the raw text of the model's reply.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Picks Groq when its key is configured, otherwise OpenAI, otherwise nothing.
pub fn provider_from_config(config: &AiConfig) -> Option<Arc<dyn QuestionProvider>> {
    if let Some(key) = &config.groq_api_key {
        let base = config.base_url.clone().unwrap_or_else(|| GROQ_BASE_URL.to_string());
        return Some(Arc::new(OpenAiCompatibleProvider::new(
            "groq",
            key,
            &config.groq_model,
            Some(base),
        )));
    }
    if let Some(key) = &config.openai_api_key {
        let base = config.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        return Some(Arc::new(OpenAiCompatibleProvider::new(
            "openai",
            key,
            &config.openai_model,
            Some(base),
        )));
    }
    None
}
