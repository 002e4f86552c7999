// src/models/generation.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::Difficulty,
};

pub const MIN_GENERATED: usize = 1;
pub const MAX_GENERATED: usize = 20;

/// Languages the generator is allowed to write in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Marathi,
    Hindi,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Marathi => "marathi",
            Language::Hindi => "hindi",
        }
    }
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "english" => Ok(Language::English),
            "marathi" => Ok(Language::Marathi),
            "hindi" => Ok(Language::Hindi),
            _ => Err(AppError::validation(
                "language must be one of: english, marathi, hindi",
            )),
        }
    }
}

/// DTO for asking the provider for a batch of questions.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateQuestionsRequest {
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    #[validate(length(min = 1, max = 10000))]
    pub syllabus: String,
    #[validate(range(min = 1, max = 20, message = "num_questions must be between 1 and 20"))]
    pub num_questions: usize,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

fn default_language() -> String {
    "english".to_string()
}

/// One item of provider output, as loosely typed as the wire allows.
///
/// Anything that does not even deserialize into this shape is dropped before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGeneratedQuestion {
    pub stem: String,
    pub options: Vec<String>,
    pub correct: i64,
    pub explanation: String,
    pub topic_tag: String,
    pub difficulty: String,
}

/// A provider item that passed every schema rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub stem: String,
    pub options: Vec<String>,
    pub correct: i64,
    pub explanation: String,
    pub topic_tag: String,
    pub difficulty: Difficulty,
}

/// DTO for turning a reviewed batch into a new test.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveGeneratedRequest {
    #[validate(length(min = 1, message = "Title is required."))]
    pub title: String,
    pub description: Option<String>,
    pub test_type: String,
    #[validate(length(min = 1, message = "At least one question is required."))]
    pub questions: Vec<GeneratedQuestion>,
    #[serde(default)]
    pub publish: bool,
}
