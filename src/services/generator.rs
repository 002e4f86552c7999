// src/services/generator.rs

//! AI question generation: prompt, provider call with retries, and output screening.

use std::{collections::HashSet, sync::LazyLock, time::Duration};

use regex::Regex;
use serde_json::Value;

use crate::{
    ai::{CompletionRequest, QuestionProvider},
    error::AppError,
    models::{
        generation::{
            GenerateQuestionsRequest, GeneratedQuestion, Language, MAX_GENERATED, MIN_GENERATED,
            RawGeneratedQuestion,
        },
        question::{Difficulty, OPTION_COUNT},
    },
};

pub const SYSTEM_PROMPT: &str = "You are an expert assessment designer.";
const TEMPERATURE: f64 = 0.4;
const MAX_TOKENS: u32 = 1500;

const MIN_STEM_CHARS: usize = 10;
const MIN_EXPLANATION_CHARS: usize = 5;

static JSON_ARRAY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("Invalid JSON array regex"));

/// How often and how patiently a generation request is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles before each later one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Asks the provider for `num_questions` items and returns the ones that pass screening.
///
/// Any failure (transport, unparseable output, too few valid items) is retried under
/// `policy`. Once attempts run out the last failure is returned as a validation error.
pub async fn generate_questions(
    provider: Option<&dyn QuestionProvider>,
    policy: &RetryPolicy,
    request: &GenerateQuestionsRequest,
) -> Result<Vec<GeneratedQuestion>, AppError> {
    let topic = request.topic.trim();
    let syllabus = request.syllabus.trim();
    if topic.is_empty() || syllabus.is_empty() {
        return Err(AppError::validation("Topic and syllabus are required"));
    }
    let difficulty: Difficulty = request
        .difficulty
        .parse()
        .map_err(|_| AppError::validation("Invalid difficulty. Choose easy, medium, or hard"))?;
    if !(MIN_GENERATED..=MAX_GENERATED).contains(&request.num_questions) {
        return Err(AppError::validation("num_questions must be between 1 and 20"));
    }
    let language: Language = request.language.parse()?;

    let provider = provider.ok_or_else(|| {
        AppError::validation(
            "AI provider not configured. Set GROQ_API_KEY or OPENAI_API_KEY in .env",
        )
    })?;

    let completion = CompletionRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        prompt: build_prompt(topic, syllabus, request.num_questions, difficulty, language),
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    };

    let mut last_error = String::new();
    for attempt in 1..=policy.max_attempts {
        tracing::info!(
            "AI generate request attempt={} provider={} topic={} n={} diff={}",
            attempt,
            provider.name(),
            topic,
            request.num_questions,
            difficulty
        );

        let outcome = match provider.complete(&completion).await {
            Ok(content) => parse_response(&content)
                .and_then(|data| validate_questions(&data, request.num_questions))
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(questions) => {
                tracing::info!("AI generate success count={}", questions.len());
                return Ok(questions);
            }
            Err(e) => {
                last_error = e;
                // The classic 1s/2s/4s schedule also sleeps 4s after the final failure.
                // That wait delays nothing, so it is skipped: 1s + 2s at most.
                if attempt < policy.max_attempts {
                    let wait = policy.delay_after(attempt);
                    tracing::warn!(
                        "AI generate failed attempt={} error={}; retrying in {:?}",
                        attempt,
                        last_error,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    tracing::error!("AI generation failed after retries: {}", last_error);
    Err(AppError::validation(format!(
        "Failed to generate questions: {last_error}"
    )))
}

pub fn build_prompt(
    topic: &str,
    syllabus: &str,
    num_questions: usize,
    difficulty: Difficulty,
    language: Language,
) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\
         Generate exactly {num_questions} multiple-choice questions on the topic '{topic}' \
         based on the following syllabus/context: \n{syllabus}\n\n\
         Requirements: Each question must have a clear stem (min 10 words), exactly 4 options, \
         the index of the correct option (0-3), an explanation, a topic_tag, and \
         difficulty='{difficulty}'. Write ALL content strictly in this language: {language}.\n\
         Return ONLY valid JSON (no commentary or backticks): an array of objects with keys: \
         stem, options (array of 4 strings), correct (0-3), explanation, topic_tag, difficulty.",
        language = language.as_str(),
    )
}

/// Extracts JSON from provider text: strips code fences, then falls back to the
/// outermost `[...]` span when the whole text does not parse.
pub fn parse_response(content: &str) -> Result<Value, AppError> {
    let mut content = content.trim();
    if content.starts_with("```") {
        content = content.trim_matches(|c: char| c == '`' || c == '\n' || c == ' ');
        if content.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("json")) {
            content = content[4..].trim();
        }
    }

    if let Ok(data) = serde_json::from_str(content) {
        return Ok(data);
    }
    let array = JSON_ARRAY_REGEX
        .find(content)
        .ok_or_else(|| AppError::validation("Provider returned non-JSON content. Please try again."))?;
    Ok(serde_json::from_str(array.as_str())?)
}

/// Screens provider items one by one, dropping the invalid ones.
///
/// Fails unless at least `max(1, floor(0.8 * expected))` items survive.
pub fn validate_questions(data: &Value, expected: usize) -> Result<Vec<GeneratedQuestion>, AppError> {
    let items = data
        .as_array()
        .ok_or_else(|| AppError::validation("AI response must be a JSON list"))?;

    let valid: Vec<GeneratedQuestion> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match check_item(item) {
            Ok(q) => Some(q),
            Err(reason) => {
                tracing::warn!("Invalid AI question idx={} error={}", i + 1, reason);
                None
            }
        })
        .collect();

    if valid.len() < minimum_accepted(expected) {
        return Err(AppError::validation("Too many invalid questions in AI output"));
    }
    Ok(valid)
}

/// `max(1, floor(0.8 * expected))`, in integer arithmetic.
pub fn minimum_accepted(expected: usize) -> usize {
    (expected * 4 / 5).max(1)
}

fn check_item(item: &Value) -> Result<GeneratedQuestion, String> {
    let raw: RawGeneratedQuestion =
        serde_json::from_value(item.clone()).map_err(|e| format!("Malformed item: {e}"))?;

    let stem = raw.stem.trim();
    if stem.chars().count() < MIN_STEM_CHARS {
        return Err("Invalid stem".into());
    }
    if raw.options.len() != OPTION_COUNT {
        return Err("Options must be list of 4".into());
    }
    let options: Vec<String> = raw.options.iter().map(|o| o.trim().to_string()).collect();
    if options.iter().collect::<HashSet<_>>().len() != OPTION_COUNT {
        return Err("Options must be unique strings".into());
    }
    if !(0..OPTION_COUNT as i64).contains(&raw.correct) {
        return Err("Correct must be 0-3 integer".into());
    }
    let explanation = raw.explanation.trim();
    if explanation.chars().count() < MIN_EXPLANATION_CHARS {
        return Err("Invalid explanation".into());
    }
    let topic_tag = raw.topic_tag.trim();
    if topic_tag.is_empty() {
        return Err("Invalid topic_tag".into());
    }
    let difficulty: Difficulty = raw
        .difficulty
        .parse()
        .map_err(|_| "Invalid difficulty".to_string())?;

    Ok(GeneratedQuestion {
        stem: stem.to_string(),
        options,
        correct: raw.correct,
        explanation: explanation.to_string(),
        topic_tag: topic_tag.to_string(),
        difficulty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockProvider;
    use serde_json::json;

    fn item(stem: &str, options: &[&str], correct: i64) -> Value {
        json!({
            "stem": stem,
            "options": options,
            "correct": correct,
            "explanation": "Because it is so.",
            "topic_tag": "rivers",
            "difficulty": "medium",
        })
    }

    fn good(n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| item(&format!("Which river is number {i}?"), &["A", "B", "C", "D"], 1))
                .collect(),
        )
    }

    fn request(n: usize) -> GenerateQuestionsRequest {
        GenerateQuestionsRequest {
            topic: "Rivers".into(),
            syllabus: "Major rivers of India".into(),
            num_questions: n,
            difficulty: "medium".into(),
            language: "english".into(),
        }
    }

    #[test]
    fn threshold_is_floor_of_eighty_percent() {
        assert_eq!(minimum_accepted(1), 1);
        assert_eq!(minimum_accepted(2), 1);
        assert_eq!(minimum_accepted(4), 3);
        assert_eq!(minimum_accepted(5), 4);
        assert_eq!(minimum_accepted(9), 7);
        assert_eq!(minimum_accepted(20), 16);
    }

    #[test]
    fn invalid_items_are_dropped_not_fatal() {
        let mut items = good(4).as_array().cloned().unwrap();
        items.push(item("short", &["A", "B", "C", "D"], 1));
        let data = Value::Array(items);

        let valid = validate_questions(&data, 5).unwrap();
        assert_eq!(valid.len(), 4);
    }

    #[test]
    fn too_few_survivors_fail_the_batch() {
        let mut items = good(3).as_array().cloned().unwrap();
        items.push(item("Which one is duplicated here?", &["A", "A", "C", "D"], 1));
        items.push(item("Which one is out of range?", &["A", "B", "C", "D"], 4));
        let err = validate_questions(&Value::Array(items), 5).unwrap_err();
        assert_eq!(
            err,
            AppError::validation("Too many invalid questions in AI output")
        );
    }

    #[test]
    fn an_all_malformed_batch_fails() {
        let items = vec![
            item("Which river?", &["A", "B", "C"], 0),
            item("Which one is duplicated here?", &["A", "A", "C", "D"], 1),
            item("Which one is out of range?", &["A", "B", "C", "D"], -1),
            json!({"stem": "Missing every other field"}),
            json!(42),
        ];
        assert_eq!(
            validate_questions(&Value::Array(items), 5).unwrap_err(),
            AppError::validation("Too many invalid questions in AI output")
        );
        assert!(validate_questions(&json!([]), 1).is_err());
    }

    #[test]
    fn a_fully_valid_batch_is_returned_in_order() {
        let valid = validate_questions(&good(5), 5).unwrap();
        assert_eq!(valid.len(), 5);
        let stems: Vec<&str> = valid.iter().map(|q| q.stem.as_str()).collect();
        assert_eq!(
            stems,
            vec![
                "Which river is number 0?",
                "Which river is number 1?",
                "Which river is number 2?",
                "Which river is number 3?",
                "Which river is number 4?",
            ]
        );
        assert!(valid.iter().all(|q| q.correct == 1 && q.options == ["A", "B", "C", "D"]));
    }

    #[test]
    fn item_rules() {
        assert!(check_item(&item("Which river is longest?", &["A", "B", "C", "D"], 0)).is_ok());
        assert!(check_item(&item("Which river?", &["A", "B", "C"], 0)).is_err());
        assert!(check_item(&item("Which river is longest?", &["A ", "A", "C", "D"], 0)).is_err());
        assert!(check_item(&json!({"stem": "Missing every other field"})).is_err());
        assert!(check_item(&json!("not an object")).is_err());

        let mut hard = item("Which river is longest?", &["A", "B", "C", "D"], 0);
        hard["difficulty"] = json!("extreme");
        assert!(check_item(&hard).is_err());

        let mut vague = item("Which river is longest?", &["A", "B", "C", "D"], 0);
        vague["explanation"] = json!("yes ");
        assert!(check_item(&vague).is_err());
    }

    #[test]
    fn items_are_trimmed() {
        let q = check_item(&item("  Which river is longest?  ", &[" A", "B ", "C", "D"], 2)).unwrap();
        assert_eq!(q.stem, "Which river is longest?");
        assert_eq!(q.options, vec!["A", "B", "C", "D"]);
        assert_eq!(q.difficulty, Difficulty::Medium);
    }

    #[test]
    fn response_parsing() {
        assert!(parse_response("[]").unwrap().is_array());
        assert!(parse_response("```json\n[{\"a\": 1}]\n```").unwrap().is_array());
        assert!(parse_response("```\n[1, 2]\n```").unwrap().is_array());
        assert_eq!(
            parse_response("Sure! Here you go: [1, 2] Enjoy.").unwrap(),
            json!([1, 2])
        );
        assert!(parse_response("no json at all").is_err());
    }

    #[test]
    fn prompt_mentions_count_language_and_difficulty() {
        let prompt = build_prompt("Rivers", "Ganga", 7, Difficulty::Hard, Language::Marathi);
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.contains("Generate exactly 7 multiple-choice questions"));
        assert!(prompt.contains("'Rivers'"));
        assert!(prompt.contains("difficulty='hard'"));
        assert!(prompt.contains("strictly in this language: marathi"));
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn input_is_checked_before_calling_the_provider() {
        let provider = MockProvider::with_fixed_response("[]");
        let policy = RetryPolicy::default();

        let mut blank = request(3);
        blank.syllabus = "   ".into();
        assert!(generate_questions(Some(&provider), &policy, &blank).await.is_err());

        assert!(generate_questions(Some(&provider), &policy, &request(21)).await.is_err());

        let mut klingon = request(3);
        klingon.language = "klingon".into();
        assert!(generate_questions(Some(&provider), &policy, &klingon).await.is_err());

        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_provider_is_a_validation_error() {
        let err = generate_questions(None, &RetryPolicy::default(), &request(3))
            .await
            .unwrap_err();
        assert!(err.message().contains("AI provider not configured"));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_a_good_batch_arrives() {
        let provider = MockProvider::scripted(
            vec![Err("connection reset".into()), Ok("not json".into())],
            Ok(good(3).to_string()),
        );
        let started = tokio::time::Instant::now();

        let questions = generate_questions(Some(&provider), &RetryPolicy::default(), &request(3))
            .await
            .unwrap();

        assert_eq!(questions.len(), 3);
        assert_eq!(provider.call_count(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3));

        let sent = provider.last_request().unwrap();
        assert_eq!(sent.system_prompt, SYSTEM_PROMPT);
        assert_eq!(sent.temperature, 0.4);
        assert_eq!(sent.max_tokens, 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_the_last_error() {
        let provider = MockProvider::failing("upstream unavailable");

        let err = generate_questions(Some(&provider), &RetryPolicy::default(), &request(2))
            .await
            .unwrap_err();

        assert_eq!(provider.call_count(), 3);
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.message().starts_with("Failed to generate questions:"));
        assert!(err.message().contains("upstream unavailable"));
    }
}
