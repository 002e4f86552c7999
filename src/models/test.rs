// src/models/test.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Whether a test is given before or after teaching the material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TestType {
    Pre,
    Post,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Pre => "pre",
            TestType::Post => "post",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(TestType::Pre),
            "post" => Ok(TestType::Post),
            _ => Err(AppError::validation("test_type must be 'pre' or 'post'")),
        }
    }
}

/// Represents the 'tests' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Test {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Owning teacher.
    pub teacher_id: i64,

    pub test_type: TestType,

    /// 8 uppercase alphanumerics, unique across all tests.
    pub access_key: String,

    /// Drafts are invisible to students.
    pub is_published: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug)]
pub struct NewTest<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub teacher_id: i64,
    pub test_type: TestType,
    pub access_key: &'a str,
}

/// Partial metadata update; `None` leaves a column untouched.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TestUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub test_type: Option<String>,
}

impl TestUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.test_type.is_none()
    }
}

/// DTO for creating a test.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTestRequest {
    #[validate(length(min = 1, message = "Title is required."))]
    pub title: String,
    pub description: Option<String>,
    pub test_type: String,
}

/// A test together with its questions in display order.
#[derive(Debug, Clone, Serialize)]
pub struct TestDetail {
    #[serde(flatten)]
    pub test: Test,
    pub questions: Vec<crate::models::question::Question>,
}
