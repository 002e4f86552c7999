// src/handlers/mod.rs

pub mod auth;
pub mod generate;
pub mod student;
pub mod tests;
