//! HTTP handlers

pub mod detect;
pub mod health;
