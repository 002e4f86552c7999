// src/models/attempt.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::models::{question::PublicQuestion, test::TestType};

/// Represents the 'attempts' table in the database.
/// Rows are append-only: the score is fixed when the row is written.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub test_id: i64,
    pub student_id: i64,

    /// Question id (as a string key) -> selected option index.
    pub answers: Json<BTreeMap<String, i64>>,

    /// Percentage in [0, 100].
    pub score: f64,

    /// Seconds between `started_at` and `completed_at`, when the client reported a start.
    pub time_taken: Option<i64>,

    pub is_submitted: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Attempt {
    /// Decodes the stored answer map back to numeric question ids, skipping keys that are not ids.
    pub fn answers_by_question(&self) -> HashMap<i64, i64> {
        self.answers
            .0
            .iter()
            .filter_map(|(k, v)| k.parse::<i64>().ok().map(|id| (id, *v)))
            .collect()
    }
}

/// Everything needed to write an attempt row.
#[derive(Debug)]
pub struct NewAttempt {
    pub test_id: i64,
    pub student_id: i64,
    pub answers: BTreeMap<String, i64>,
    pub score: f64,
    pub time_taken: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Attempt row joined with its test title, for the student's history.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttemptSummary {
    pub id: i64,
    pub test_id: i64,
    pub test_title: String,
    pub test_type: TestType,
    pub score: f64,
    pub time_taken: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Ephemeral payload handed to the student when a test is opened. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSnapshot {
    pub test_id: i64,
    pub test_title: String,
    pub test_type: TestType,
    pub questions_count: usize,
    pub questions: Vec<PublicQuestion>,
    /// Echo this back on submit to have `time_taken` recorded.
    pub started_at: DateTime<Utc>,
}

/// DTO for submitting a test attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// Key: Question ID, Value: selected option index (0-3).
    pub answers: HashMap<i64, i64>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Per-question line of an attempt breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub question_text: String,
    pub options: Vec<String>,
    pub student_answer: Option<i64>,
    pub correct_answer: i64,
    pub is_correct: bool,
    pub explanation: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResults {
    pub attempt_id: i64,
    pub test_id: i64,
    pub score: f64,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_taken: Option<i64>,
    pub detailed_results: Vec<QuestionResult>,
}

/// Mean score movement between a pre-test and a post-test for one student.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub pre_score: f64,
    pub post_score: f64,
    pub improvement_abs: f64,
    /// Zero when the pre-test mean is zero.
    pub improvement_pct: f64,
}

#[derive(Debug, Deserialize)]
pub struct ImprovementQuery {
    pub pre: i64,
    pub post: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionStat {
    pub question_id: i64,
    pub question_text: String,
    pub topic: Option<String>,
    pub answered: usize,
    pub correct: usize,
    /// Percentage of attempts that got this question right.
    pub correct_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicStat {
    pub topic: String,
    pub answered: usize,
    pub correct: usize,
    pub mastery: f64,
}

/// Aggregates for one test, shown to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAnalytics {
    pub test_id: i64,
    pub attempts: usize,
    pub unique_students: usize,
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub questions: Vec<QuestionStat>,
    pub topics: Vec<TopicStat>,
}
