// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Number of characters in a test access key.
pub const ACCESS_KEY_LENGTH: usize = 8;

/// How many fresh access keys `create_test` tries before giving up.
pub const ACCESS_KEY_ATTEMPTS: usize = 5;

/// Per-minute limits for the rate-limited actions.
pub const REGISTER_LIMIT_PER_MINUTE: u32 = 5;
pub const LOGIN_LIMIT_PER_MINUTE: u32 = 10;
pub const AI_GENERATE_LIMIT_PER_MINUTE: u32 = 10;
pub const AI_SAVE_LIMIT_PER_MINUTE: u32 = 5;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub rate_limit_per_minute: u32,
    pub ai: AiConfig,
    /// Whether questions may still be added to or removed from a published test.
    pub allow_edits_after_publish: bool,
}

/// Credentials for the text-generation backends. Groq wins when both keys are present.
#[derive(Debug, Clone, Default)]
pub struct AiConfig {
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://test_platform.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let rate_limit_per_minute = env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let allow_edits_after_publish = env::var("ALLOW_EDITS_AFTER_PUBLISH")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            rate_limit_per_minute,
            ai: AiConfig::from_env(),
            allow_edits_after_publish,
        }
    }
}

impl AiConfig {
    pub fn from_env() -> Self {
        Self {
            groq_api_key: non_empty_var("GROQ_API_KEY"),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.1-8b-instant".to_string()),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
            base_url: non_empty_var("AI_BASE_URL"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn flags_accept_common_truthy_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
