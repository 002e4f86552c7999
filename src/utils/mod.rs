pub mod access_key;
pub mod hash;
pub mod jwt;
pub mod rate_limit;
pub mod validators;
