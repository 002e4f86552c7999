// src/utils/access_key.rs

use rand::{Rng, rngs::OsRng};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws a public join code from the OS CSPRNG: uppercase letters and digits only.
///
/// Uniqueness is not guaranteed here; the `tests.access_key` UNIQUE constraint is
/// the arbiter and `create_test` retries with a fresh key when it fires.
pub fn generate_access_key(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Canonical form used for storage and lookup.
pub fn normalize_access_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn keys_use_the_restricted_alphabet() {
        for _ in 0..100 {
            let key = generate_access_key(8);
            assert_eq!(key.len(), 8);
            assert!(key.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn keys_do_not_repeat_in_practice() {
        let keys: HashSet<String> = (0..1000).map(|_| generate_access_key(8)).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn normalization_trims_and_uppercases() {
        assert_eq!(normalize_access_key("  ab12cd34 "), "AB12CD34");
    }
}
