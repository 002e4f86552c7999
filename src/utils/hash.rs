use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use crate::{error::AppError, utils::validators::validate_password};

/// Checks password strength, then produces a salted Argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    validate_password(password)?;

    let salt = SaltString::generate(&mut OsRng);

    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            AppError::validation("Unable to hash password")
        })?
        .to_string();

    Ok(password_hash)
}

/// Never fails: a malformed stored hash simply does not verify.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(password_hash) else {
        tracing::warn!("Stored password hash could not be parsed");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
