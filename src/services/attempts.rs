// src/services/attempts.rs

//! Taking tests: serving questions, scoring submissions, results and analytics.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    db,
    error::AppError,
    models::{
        attempt::{
            Attempt, AttemptResults, AttemptSnapshot, AttemptSummary, Improvement, NewAttempt,
            QuestionResult, QuestionStat, TestAnalytics, TopicStat,
        },
        question::{OPTION_COUNT, PublicQuestion, Question},
    },
    services::authoring::load_owned_test,
};

/// Topic bucket for questions without a tag.
pub const UNTAGGED_TOPIC: &str = "general";

/// Percentage of questions answered correctly; 0.0 for a test without questions.
pub fn score_answers(questions: &[Question], answers: &HashMap<i64, i64>) -> f64 {
    if questions.is_empty() {
        return 0.0;
    }
    let correct = questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_answer))
        .count();
    correct as f64 / questions.len() as f64 * 100.0
}

/// Difference between two mean scores. The relative change is 0 when the pre mean is 0.
pub fn improvement(pre_score: f64, post_score: f64) -> Improvement {
    let improvement_abs = post_score - pre_score;
    let improvement_pct = if pre_score > 0.0 {
        improvement_abs / pre_score * 100.0
    } else {
        0.0
    };
    Improvement {
        pre_score,
        post_score,
        improvement_abs,
        improvement_pct,
    }
}

/// Serves a published test's questions without answers. Nothing is written.
pub async fn start_attempt(
    pool: &SqlitePool,
    test_id: i64,
    student_id: i64,
) -> Result<AttemptSnapshot, AppError> {
    let mut conn = pool.acquire().await?;
    let test = db::tests::find_by_id(&mut conn, test_id)
        .await?
        .filter(|t| t.is_published)
        .ok_or_else(|| AppError::validation("Test not found or not published"))?;
    let questions = db::questions::list_by_test(&mut conn, test_id).await?;

    tracing::info!("Attempt started test_id={} student_id={}", test_id, student_id);
    Ok(AttemptSnapshot {
        test_id: test.id,
        test_title: test.title,
        test_type: test.test_type,
        questions_count: questions.len(),
        questions: questions.into_iter().map(PublicQuestion::from).collect(),
        started_at: Utc::now(),
    })
}

/// Scores a complete answer sheet and stores it as a new attempt.
///
/// The answer keys must be exactly the test's question ids. `started_at` is the value
/// handed out by [`start_attempt`]; when present and not in the future, `time_taken`
/// is recorded in whole seconds.
pub async fn submit_attempt(
    pool: &SqlitePool,
    test_id: i64,
    student_id: i64,
    answers: &HashMap<i64, i64>,
    started_at: Option<DateTime<Utc>>,
) -> Result<Attempt, AppError> {
    let mut tx = db::begin(pool).await?;

    let test = db::tests::find_by_id(&mut tx, test_id)
        .await?
        .ok_or_else(|| AppError::validation("Test not found"))?;
    if !test.is_published {
        return Err(AppError::validation("Test is not published"));
    }

    let questions = db::questions::list_by_test(&mut tx, test_id).await?;
    if questions.is_empty() {
        return Err(AppError::validation("Test has no questions"));
    }
    check_answer_sheet(&questions, answers)?;

    let score = score_answers(&questions, answers);
    let completed_at = Utc::now();
    let (started_at, time_taken) = match started_at {
        Some(start) if start <= completed_at => {
            (start, Some((completed_at - start).num_seconds()))
        }
        _ => (completed_at, None),
    };

    let attempt = db::attempts::insert(
        &mut tx,
        &NewAttempt {
            test_id,
            student_id,
            answers: answers
                .iter()
                .map(|(qid, answer)| (qid.to_string(), *answer))
                .collect(),
            score,
            time_taken,
            started_at,
            completed_at,
        },
    )
    .await?;
    db::commit(tx).await?;

    tracing::info!(
        "Attempt submitted id={} test_id={} student_id={} score={:.2}",
        attempt.id,
        test_id,
        student_id,
        score
    );
    Ok(attempt)
}

fn check_answer_sheet(questions: &[Question], answers: &HashMap<i64, i64>) -> Result<(), AppError> {
    let expected: HashSet<i64> = questions.iter().map(|q| q.id).collect();
    let given: HashSet<i64> = answers.keys().copied().collect();

    let mut missing: Vec<i64> = expected.difference(&given).copied().collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(AppError::validation(format!(
            "All questions must be answered; missing answers for questions {missing:?}"
        )));
    }
    let mut unknown: Vec<i64> = given.difference(&expected).copied().collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(AppError::validation(format!(
            "Answers reference questions not in this test: {unknown:?}"
        )));
    }

    if let Some((qid, _)) = answers
        .iter()
        .find(|&(_, &a)| !(0..OPTION_COUNT as i64).contains(&a))
    {
        return Err(AppError::validation(format!(
            "Answer for question {qid} must be between 0 and 3"
        )));
    }
    Ok(())
}

/// Per-question breakdown of an attempt, visible only to the student who made it.
pub async fn get_attempt_results(
    pool: &SqlitePool,
    attempt_id: i64,
    student_id: i64,
) -> Result<AttemptResults, AppError> {
    let mut conn = pool.acquire().await?;
    let attempt = db::attempts::find_by_id(&mut conn, attempt_id)
        .await?
        .ok_or_else(|| AppError::validation("Attempt not found"))?;
    if attempt.student_id != student_id {
        tracing::warn!(
            "Unauthorized results access attempt_id={} student_id={}",
            attempt_id,
            student_id
        );
        return Err(AppError::Forbidden(
            "You are not authorized to view this attempt".to_string(),
        ));
    }

    let answers = attempt.answers_by_question();
    let questions = db::questions::list_by_test(&mut conn, attempt.test_id).await?;
    let detailed_results = questions
        .into_iter()
        .map(|q| {
            let student_answer = answers.get(&q.id).copied();
            QuestionResult {
                question_id: q.id,
                is_correct: student_answer == Some(q.correct_answer),
                question_text: q.question_text,
                options: q.options.0,
                student_answer,
                correct_answer: q.correct_answer,
                explanation: q.explanation,
                topic: q.topic_tag,
            }
        })
        .collect();

    Ok(AttemptResults {
        attempt_id: attempt.id,
        test_id: attempt.test_id,
        score: attempt.score,
        completed_at: attempt.completed_at,
        time_taken: attempt.time_taken,
        detailed_results,
    })
}

/// Compares a student's mean score on a pre-test with a post-test.
/// A test with no attempts counts as a mean of 0.
pub async fn calculate_improvement(
    pool: &SqlitePool,
    student_id: i64,
    pre_test_id: i64,
    post_test_id: i64,
) -> Result<Improvement, AppError> {
    let mut conn = pool.acquire().await?;
    let pre = db::attempts::average_score(&mut conn, student_id, pre_test_id)
        .await?
        .unwrap_or(0.0);
    let post = db::attempts::average_score(&mut conn, student_id, post_test_id)
        .await?
        .unwrap_or(0.0);
    Ok(improvement(pre, post))
}

pub async fn student_attempts(
    pool: &SqlitePool,
    student_id: i64,
) -> Result<Vec<AttemptSummary>, AppError> {
    let mut conn = pool.acquire().await?;
    db::attempts::list_by_student(&mut conn, student_id).await
}

/// Owner-only aggregates over every attempt at a test.
pub async fn test_analytics(
    pool: &SqlitePool,
    test_id: i64,
    teacher_id: i64,
) -> Result<TestAnalytics, AppError> {
    let mut conn = pool.acquire().await?;
    load_owned_test(&mut conn, test_id, teacher_id, "view").await?;
    let questions = db::questions::list_by_test(&mut conn, test_id).await?;
    let attempts = db::attempts::list_by_test(&mut conn, test_id).await?;
    Ok(summarize(test_id, &questions, &attempts))
}

fn summarize(test_id: i64, questions: &[Question], attempts: &[Attempt]) -> TestAnalytics {
    let scores: Vec<f64> = attempts.iter().map(|a| a.score).collect();
    let unique_students = attempts
        .iter()
        .map(|a| a.student_id)
        .collect::<HashSet<_>>()
        .len();
    let average_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    let min_score = scores.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max_score = scores.iter().copied().reduce(f64::max).unwrap_or(0.0);

    let sheets: Vec<HashMap<i64, i64>> = attempts.iter().map(Attempt::answers_by_question).collect();

    let mut topics: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let question_stats = questions
        .iter()
        .map(|q| {
            let answered = sheets.iter().filter(|s| s.contains_key(&q.id)).count();
            let correct = sheets
                .iter()
                .filter(|s| s.get(&q.id) == Some(&q.correct_answer))
                .count();

            let topic = q.topic_tag.clone().unwrap_or_else(|| UNTAGGED_TOPIC.to_string());
            let entry = topics.entry(topic.clone()).or_default();
            entry.0 += answered;
            entry.1 += correct;

            QuestionStat {
                question_id: q.id,
                question_text: q.question_text.clone(),
                topic: Some(topic),
                answered,
                correct,
                correct_rate: percentage(correct, answered),
            }
        })
        .collect();

    TestAnalytics {
        test_id,
        attempts: attempts.len(),
        unique_students,
        average_score,
        min_score,
        max_score,
        questions: question_stats,
        topics: topics
            .into_iter()
            .map(|(topic, (answered, correct))| TopicStat {
                topic,
                answered,
                correct,
                mastery: percentage(correct, answered),
            })
            .collect(),
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
