// src/utils/validators.rs

//! Input hygiene applied before anything reaches the database.
//!
//! Every function is pure and returns the cleaned value, or
//! `AppError::Validation` with a message that can be shown to the user.

use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,50}$").expect("valid username regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

pub const MAX_EMAIL_LENGTH: usize = 120;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub fn validate_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::validation(
            "Username must be 3-50 chars, alphanumeric or underscore only",
        ));
    }
    Ok(username.to_string())
}

pub fn validate_email(email: &str) -> Result<String, AppError> {
    let email = email.trim();
    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(AppError::validation(format!(
            "Email must be at most {MAX_EMAIL_LENGTH} characters"
        )));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(AppError::validation("Invalid email format"));
    }
    Ok(email.to_string())
}

/// Strength rules: at least 8 characters with an uppercase letter, a lowercase letter and a digit.
pub fn validate_password(password: &str) -> Result<&str, AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AppError::validation(
            "Password must include at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AppError::validation(
            "Password must include at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::validation(
            "Password must include at least one digit",
        ));
    }
    Ok(password)
}

/// Trims, drops ASCII control characters and enforces `max_length` (in characters).
pub fn sanitize_string(text: &str, max_length: usize) -> Result<String, AppError> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !c.is_ascii_control())
        .collect();
    if cleaned.chars().count() > max_length {
        return Err(AppError::validation(format!(
            "Text must be at most {max_length} characters"
        )));
    }
    Ok(cleaned)
}

/// Coerces anything printable to an integer and checks the optional bounds.
pub fn validate_integer<T: Display>(
    value: T,
    min: Option<i64>,
    max: Option<i64>,
) -> Result<i64, AppError> {
    let parsed: i64 = value
        .to_string()
        .trim()
        .parse()
        .map_err(|_| AppError::validation("Value must be an integer"))?;
    if let Some(min) = min.filter(|&min| parsed < min) {
        return Err(AppError::validation(format!("Value must be >= {min}")));
    }
    if let Some(max) = max.filter(|&max| parsed > max) {
        return Err(AppError::validation(format!("Value must be <= {max}")));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_accepts_word_characters() {
        assert_eq!(validate_username("user_123").unwrap(), "user_123");
        assert_eq!(validate_username("  padded_name ").unwrap(), "padded_name");
    }

    #[test]
    fn username_rejects_short_or_symbolic() {
        assert!(validate_username("x").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("dash-name").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
    }

    #[test]
    fn email_format_and_length() {
        assert_eq!(validate_email("a@b.com").unwrap(), "a@b.com");
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b.c").is_err());
        let long = format!("{}@example.com", "a".repeat(120));
        assert!(validate_email(&long).is_err());
    }

    #[test]
    fn password_strength() {
        assert_eq!(validate_password("Strong123").unwrap(), "Strong123");
        assert!(validate_password("weak").is_err());
        assert!(validate_password("alllower1").is_err());
        assert!(validate_password("ALLUPPER1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
    }

    #[test]
    fn sanitize_strips_control_characters() {
        assert_eq!(sanitize_string("  hi\u{0}there\u{7f} ", 100).unwrap(), "hithere");
        assert_eq!(sanitize_string("tab\there", 100).unwrap(), "tabhere");
        assert!(sanitize_string("abcdef", 5).is_err());
        assert_eq!(sanitize_string("ünï", 3).unwrap(), "ünï");
    }

    #[test]
    fn integer_bounds_and_coercion() {
        assert_eq!(validate_integer("42", Some(0), None).unwrap(), 42);
        assert_eq!(validate_integer(3, Some(0), Some(3)).unwrap(), 3);
        assert!(validate_integer(-1, Some(0), None).is_err());
        assert!(validate_integer(4, None, Some(3)).is_err());
        assert!(validate_integer("four", None, None).is_err());
    }
}
