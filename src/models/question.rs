// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::error::AppError;

/// Number of options every question carries.
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(AppError::validation(
                "difficulty must be 'easy', 'medium', or 'hard'",
            )),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,

    /// The stem shown to the student.
    pub question_text: String,

    /// Exactly four distinct options, stored as a JSON array.
    pub options: Json<Vec<String>>,

    /// Index (0-3) into `options`.
    pub correct_answer: i64,

    pub explanation: Option<String>,
    pub topic_tag: Option<String>,
    pub difficulty: Difficulty,

    /// Display position within the test, unique per test.
    /// Mapped from the database column 'display_order' since `order` is a reserved SQL keyword.
    #[sqlx(rename = "display_order")]
    pub order: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Student-facing view of a question: the answer and explanation are withheld.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub options: Vec<String>,
    pub topic_tag: Option<String>,
    pub difficulty: Difficulty,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text,
            options: q.options.0,
            topic_tag: q.topic_tag,
            difficulty: q.difficulty,
        }
    }
}

/// Validated question ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: i64,
    pub explanation: Option<String>,
    pub topic_tag: Option<String>,
    pub difficulty: Difficulty,
}

/// DTO for adding a question to a test.
///
/// `order` may be omitted, in which case the next free position is assigned.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, message = "Question text is required."))]
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: i64,
    pub explanation: Option<String>,
    pub topic_tag: Option<String>,
    pub difficulty: String,
    pub order: Option<i64>,
}
