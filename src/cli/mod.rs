//! CLI support for sift-lang
//!
//! Exposes the `check` command programmatically so other tools can embed it.

mod check;

pub use check::{CheckOptions, CheckResult, execute_check};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Expression error: {0}")]
    Expression(#[from] crate::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
