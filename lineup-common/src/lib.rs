//! # Lineup Common Library
//!
//! Shared infrastructure for the lineup bot: error types, TOML configuration
//! with aggregated startup validation, the versioned snapshot schema used for
//! persistence, and the key-value storage abstraction (SQLite or in-memory).

pub mod config;
pub mod error;
pub mod snapshot;
pub mod storage;

pub use error::{Error, Result};
