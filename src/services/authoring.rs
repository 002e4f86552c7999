// src/services/authoring.rs

//! Test and question lifecycle for teachers: create, edit, publish, delete.
//!
//! Every mutation is ownership-checked against the calling teacher and runs in
//! one transaction. Ownership and existence failures are `AppError::Validation`.

use std::collections::HashSet;

use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    config::{ACCESS_KEY_ATTEMPTS, ACCESS_KEY_LENGTH},
    db,
    error::AppError,
    models::{
        generation::SaveGeneratedRequest,
        question::{CreateQuestionRequest, Difficulty, NewQuestion, OPTION_COUNT, Question},
        test::{NewTest, Test, TestDetail, TestType, TestUpdate},
        user::Role,
    },
    utils::{
        access_key::{generate_access_key, normalize_access_key},
        validators::{sanitize_string, validate_integer},
    },
};

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_QUESTION_LENGTH: usize = 2000;
pub const MAX_EXPLANATION_LENGTH: usize = 1000;
pub const MAX_TOPIC_LENGTH: usize = 120;
pub const MAX_OPTION_LENGTH: usize = 255;

/// Whether questions of an already published test may still change.
#[derive(Debug, Clone, Copy)]
pub struct EditPolicy {
    pub allow_edits_after_publish: bool,
}

/// Creates an unpublished test with a fresh access key.
pub async fn create_test(
    pool: &SqlitePool,
    teacher_id: i64,
    title: &str,
    description: Option<&str>,
    test_type: &str,
) -> Result<Test, AppError> {
    create_test_with_keys(pool, teacher_id, title, description, test_type, || {
        generate_access_key(ACCESS_KEY_LENGTH)
    })
    .await
}

async fn create_test_with_keys(
    pool: &SqlitePool,
    teacher_id: i64,
    title: &str,
    description: Option<&str>,
    test_type: &str,
    next_key: impl FnMut() -> String,
) -> Result<Test, AppError> {
    let (title, description, test_type) = clean_test_fields(title, description, test_type)?;

    let mut tx = db::begin(pool).await?;
    ensure_teacher(&mut tx, teacher_id).await?;
    let test = insert_with_fresh_key(
        &mut tx,
        &title,
        description.as_deref(),
        teacher_id,
        test_type,
        next_key,
    )
    .await?;
    db::commit(tx).await?;

    tracing::info!("Test created teacher_id={} title={}", teacher_id, title);
    Ok(test)
}

/// Appends a question to a test the teacher owns.
///
/// Without an explicit `order` the next free position is computed inside the same
/// transaction as the insert; an explicit order that is already taken is rejected.
pub async fn add_question(
    pool: &SqlitePool,
    policy: EditPolicy,
    teacher_id: i64,
    test_id: i64,
    request: &CreateQuestionRequest,
) -> Result<Question, AppError> {
    let question = clean_question(request)?;
    let order = request
        .order
        .map(|o| validate_integer(o, Some(0), None))
        .transpose()?;

    let mut tx = db::begin(pool).await?;
    let test = load_owned_test(&mut tx, test_id, teacher_id, "edit").await?;
    ensure_editable(&test, policy)?;

    let order = match order {
        Some(order) => order,
        None => db::questions::next_order(&mut tx, test_id).await?,
    };
    let created = db::questions::insert(&mut tx, test_id, &question, order)
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::validation(format!(
                "Question order {order} is already used in this test"
            )),
            other => other,
        })?;
    db::commit(tx).await?;

    tracing::info!("Question added test_id={} qid={}", test_id, created.id);
    Ok(created)
}

pub async fn delete_question(
    pool: &SqlitePool,
    policy: EditPolicy,
    teacher_id: i64,
    test_id: i64,
    question_id: i64,
) -> Result<bool, AppError> {
    let mut tx = db::begin(pool).await?;
    let test = load_owned_test(&mut tx, test_id, teacher_id, "edit").await?;
    ensure_editable(&test, policy)?;

    match db::questions::find_by_id(&mut tx, question_id).await? {
        Some(q) if q.test_id == test_id => {}
        _ => return Err(AppError::validation("Question not found")),
    }
    let deleted = db::questions::delete(&mut tx, question_id).await?;
    db::commit(tx).await?;
    Ok(deleted)
}

/// Makes a test visible to students. Does not require any questions.
pub async fn publish_test(
    pool: &SqlitePool,
    test_id: i64,
    teacher_id: i64,
) -> Result<Test, AppError> {
    let mut tx = db::begin(pool).await?;
    load_owned_test(&mut tx, test_id, teacher_id, "publish").await?;
    let updated = db::tests::set_published(&mut tx, test_id, true).await?;
    db::commit(tx).await?;

    tracing::info!("Test published id={}", test_id);
    Ok(updated)
}

/// Partial metadata update. With no fields set the stored test is returned untouched.
pub async fn update_test_metadata(
    pool: &SqlitePool,
    test_id: i64,
    teacher_id: i64,
    update: &TestUpdate,
) -> Result<Test, AppError> {
    let title = update
        .title
        .as_deref()
        .map(|t| sanitize_string(t, MAX_TITLE_LENGTH))
        .transpose()?;
    if title.as_deref() == Some("") {
        return Err(AppError::validation("Title is required"));
    }
    // Some(None) clears the description; blanks are stored as NULL, as on create
    let description = update
        .description
        .as_deref()
        .map(|d| sanitize_string(d, MAX_DESCRIPTION_LENGTH))
        .transpose()?
        .map(|d| Some(d).filter(|d| !d.is_empty()));
    let test_type = update
        .test_type
        .as_deref()
        .map(str::parse::<TestType>)
        .transpose()?;

    let mut tx = db::begin(pool).await?;
    let test = load_owned_test(&mut tx, test_id, teacher_id, "edit").await?;
    if update.is_empty() {
        return Ok(test);
    }
    let updated = db::tests::update_metadata(
        &mut tx,
        test_id,
        title.as_deref(),
        description.as_ref().map(Option::as_deref),
        test_type,
    )
    .await?;
    db::commit(tx).await?;

    tracing::info!("Test metadata updated id={}", test_id);
    Ok(updated)
}

/// Deletes a test with its questions and attempts.
pub async fn delete_test(
    pool: &SqlitePool,
    test_id: i64,
    teacher_id: i64,
) -> Result<bool, AppError> {
    let mut tx = db::begin(pool).await?;
    load_owned_test(&mut tx, test_id, teacher_id, "delete").await?;
    let deleted = db::tests::delete(&mut tx, test_id).await?;
    db::commit(tx).await?;
    Ok(deleted)
}

/// Student join flow. Unknown keys and unpublished tests fail with the same message.
pub async fn get_test_by_key(pool: &SqlitePool, access_key: &str) -> Result<Test, AppError> {
    let key = normalize_access_key(access_key);
    if key.is_empty() {
        return Err(AppError::validation("Access key is required"));
    }

    let mut conn = pool.acquire().await?;
    match db::tests::find_by_access_key(&mut conn, &key).await? {
        Some(test) if test.is_published => Ok(test),
        _ => Err(AppError::validation("Test not found for provided access key")),
    }
}

pub async fn teacher_tests(pool: &SqlitePool, teacher_id: i64) -> Result<Vec<Test>, AppError> {
    let mut conn = pool.acquire().await?;
    db::tests::list_by_teacher(&mut conn, teacher_id).await
}

pub async fn published_tests(pool: &SqlitePool) -> Result<Vec<Test>, AppError> {
    let mut conn = pool.acquire().await?;
    db::tests::list_published(&mut conn).await
}

/// Owner's view of a test, answers included.
pub async fn test_questions(
    pool: &SqlitePool,
    test_id: i64,
    teacher_id: i64,
) -> Result<TestDetail, AppError> {
    let mut conn = pool.acquire().await?;
    let test = load_owned_test(&mut conn, test_id, teacher_id, "view").await?;
    let questions = db::questions::list_by_test(&mut conn, test_id).await?;
    Ok(TestDetail { test, questions })
}

/// Creates a test from a reviewed AI batch in one transaction, questions in batch order.
pub async fn save_generated_test(
    pool: &SqlitePool,
    teacher_id: i64,
    request: &SaveGeneratedRequest,
) -> Result<TestDetail, AppError> {
    let (title, description, test_type) = clean_test_fields(
        &request.title,
        request.description.as_deref(),
        &request.test_type,
    )?;
    if request.questions.is_empty() {
        return Err(AppError::validation("At least one question is required"));
    }
    let cleaned = request
        .questions
        .iter()
        .map(|q| {
            clean_question(&CreateQuestionRequest {
                question_text: q.stem.clone(),
                options: q.options.clone(),
                correct_answer: q.correct,
                explanation: Some(q.explanation.clone()),
                topic_tag: Some(q.topic_tag.clone()),
                difficulty: q.difficulty.as_str().to_string(),
                order: None,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut tx = db::begin(pool).await?;
    ensure_teacher(&mut tx, teacher_id).await?;
    let mut test = insert_with_fresh_key(
        &mut tx,
        &title,
        description.as_deref(),
        teacher_id,
        test_type,
        || generate_access_key(ACCESS_KEY_LENGTH),
    )
    .await?;

    let mut questions = Vec::with_capacity(cleaned.len());
    for (order, question) in cleaned.iter().enumerate() {
        questions.push(db::questions::insert(&mut tx, test.id, question, order as i64).await?);
    }
    if request.publish {
        test = db::tests::set_published(&mut tx, test.id, true).await?;
    }
    db::commit(tx).await?;

    tracing::info!(
        "Generated test saved id={} questions={} published={}",
        test.id,
        questions.len(),
        test.is_published
    );
    Ok(TestDetail { test, questions })
}

/// Fetches a test and checks it belongs to `teacher_id`.
pub(crate) async fn load_owned_test(
    conn: &mut SqliteConnection,
    test_id: i64,
    teacher_id: i64,
    action: &str,
) -> Result<Test, AppError> {
    let test = db::tests::find_by_id(conn, test_id)
        .await?
        .ok_or_else(|| AppError::validation("Test not found"))?;
    if test.teacher_id != teacher_id {
        return Err(AppError::validation(format!(
            "You do not have permission to {action} this test"
        )));
    }
    Ok(test)
}

async fn ensure_teacher(conn: &mut SqliteConnection, teacher_id: i64) -> Result<(), AppError> {
    match db::users::find_by_id(conn, teacher_id).await? {
        Some(user) if user.role == Role::Teacher => Ok(()),
        Some(_) => Err(AppError::validation("Only teachers can create tests")),
        None => Err(AppError::validation("Teacher not found")),
    }
}

fn ensure_editable(test: &Test, policy: EditPolicy) -> Result<(), AppError> {
    if test.is_published && !policy.allow_edits_after_publish {
        return Err(AppError::validation(
            "Test is published; its questions can no longer be changed",
        ));
    }
    Ok(())
}

/// Tries fresh keys until the UNIQUE constraint accepts one.
async fn insert_with_fresh_key(
    conn: &mut SqliteConnection,
    title: &str,
    description: Option<&str>,
    teacher_id: i64,
    test_type: TestType,
    mut next_key: impl FnMut() -> String,
) -> Result<Test, AppError> {
    for attempt in 1..=ACCESS_KEY_ATTEMPTS {
        let access_key = normalize_access_key(&next_key());
        let new_test = NewTest {
            title,
            description,
            teacher_id,
            test_type,
            access_key: &access_key,
        };
        match db::tests::insert(&mut *conn, &new_test).await {
            Ok(test) => return Ok(test),
            Err(AppError::Conflict(_)) => {
                tracing::warn!("Access key collision on attempt {}, regenerating", attempt);
            }
            Err(e) => return Err(e),
        }
    }
    Err(AppError::validation(
        "Could not allocate a unique access key, please try again",
    ))
}

fn clean_test_fields(
    title: &str,
    description: Option<&str>,
    test_type: &str,
) -> Result<(String, Option<String>, TestType), AppError> {
    let title = sanitize_string(title, MAX_TITLE_LENGTH)?;
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    let description = description
        .map(|d| sanitize_string(d, MAX_DESCRIPTION_LENGTH))
        .transpose()?
        .filter(|d| !d.is_empty());
    let test_type = test_type.parse::<TestType>()?;
    Ok((title, description, test_type))
}

fn clean_question(request: &CreateQuestionRequest) -> Result<NewQuestion, AppError> {
    let question_text = sanitize_string(&request.question_text, MAX_QUESTION_LENGTH)?;
    if question_text.is_empty() {
        return Err(AppError::validation("Question text is required"));
    }

    if request.options.len() != OPTION_COUNT {
        return Err(AppError::validation("Exactly 4 options are required"));
    }
    let options = request
        .options
        .iter()
        .map(|o| sanitize_string(o, MAX_OPTION_LENGTH))
        .collect::<Result<Vec<_>, _>>()?;
    if options.iter().any(String::is_empty) {
        return Err(AppError::validation("Options cannot be empty"));
    }
    if options.iter().collect::<HashSet<_>>().len() != OPTION_COUNT {
        return Err(AppError::validation("Options must be unique"));
    }

    if !(0..OPTION_COUNT as i64).contains(&request.correct_answer) {
        return Err(AppError::validation(
            "correct_answer must be an integer between 0 and 3",
        ));
    }

    let explanation = optional_text(request.explanation.as_deref(), MAX_EXPLANATION_LENGTH)?;
    let topic_tag = optional_text(request.topic_tag.as_deref(), MAX_TOPIC_LENGTH)?;
    let difficulty = request.difficulty.parse::<Difficulty>()?;

    Ok(NewQuestion {
        question_text,
        options,
        correct_answer: request.correct_answer,
        explanation,
        topic_tag,
        difficulty,
    })
}

fn optional_text(value: Option<&str>, max_length: usize) -> Result<Option<String>, AppError> {
    Ok(value
        .map(|v| sanitize_string(v, max_length))
        .transpose()?
        .filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::register_user;

    fn question(options: &[&str], correct: i64) -> CreateQuestionRequest {
        CreateQuestionRequest {
            question_text: "What is the capital of France?".into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: correct,
            explanation: Some("Paris is the capital.".into()),
            topic_tag: Some("geography".into()),
            difficulty: "easy".into(),
            order: None,
        }
    }

    #[test]
    fn question_rules() {
        assert!(clean_question(&question(&["a", "b", "c", "d"], 0)).is_ok());
        assert!(clean_question(&question(&["a", "b", "c"], 0)).is_err());
        assert!(clean_question(&question(&["a", "a", "c", "d"], 0)).is_err());
        // sanitizing makes " a" and "a" the same option
        assert!(clean_question(&question(&[" a", "a", "c", "d"], 0)).is_err());
        assert!(clean_question(&question(&["a", "b", "c", "d"], 4)).is_err());
        assert!(clean_question(&question(&["a", "b", "c", "d"], -1)).is_err());

        let mut bad_difficulty = question(&["a", "b", "c", "d"], 1);
        bad_difficulty.difficulty = "extreme".into();
        assert!(clean_question(&bad_difficulty).is_err());
    }

    #[test]
    fn blank_optional_text_is_stored_as_null() {
        let mut req = question(&["a", "b", "c", "d"], 1);
        req.explanation = Some("   ".into());
        req.topic_tag = None;
        let cleaned = clean_question(&req).unwrap();
        assert_eq!(cleaned.explanation, None);
        assert_eq!(cleaned.topic_tag, None);
    }

    #[tokio::test]
    async fn colliding_access_key_is_regenerated() {
        let pool = db::in_memory().await.unwrap();
        let teacher = register_user(&pool, "teach", "t@e.com", "Teacher123", "teacher")
            .await
            .unwrap();

        let first = create_test_with_keys(&pool, teacher.id, "First", None, "pre", || {
            "SAMEKEY1".to_string()
        })
        .await
        .unwrap();
        assert_eq!(first.access_key, "SAMEKEY1");

        let mut keys = vec!["FRESHKEY".to_string(), "SAMEKEY1".to_string()];
        let second = create_test_with_keys(&pool, teacher.id, "Second", None, "post", || {
            keys.pop().unwrap_or_default()
        })
        .await
        .unwrap();
        assert_eq!(second.access_key, "FRESHKEY");
    }

    #[tokio::test]
    async fn exhausting_key_attempts_fails_cleanly() {
        let pool = db::in_memory().await.unwrap();
        let teacher = register_user(&pool, "teach", "t@e.com", "Teacher123", "teacher")
            .await
            .unwrap();

        create_test_with_keys(&pool, teacher.id, "First", None, "pre", || "DUPLICAT".into())
            .await
            .unwrap();
        let err = create_test_with_keys(&pool, teacher.id, "Again", None, "pre", || {
            "DUPLICAT".into()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(teacher_tests(&pool, teacher.id).await.unwrap().len(), 1);
    }
}
