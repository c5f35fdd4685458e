//! Wire data models

pub mod record;

pub use record::*;
