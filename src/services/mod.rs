// src/services/mod.rs

//! Business operations. Each one validates its input, then runs inside a single
//! transaction (or a plain connection when it only reads).

pub mod attempts;
pub mod auth;
pub mod authoring;
pub mod generator;
