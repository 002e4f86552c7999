// src/models/mod.rs

pub mod attempt;
pub mod generation;
pub mod question;
pub mod test;
pub mod user;
