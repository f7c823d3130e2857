//! State store error types

use std::path::PathBuf;
use thiserror::Error;

/// State persistence errors. Any of these is fatal for a run: planning
/// against inaccurate prior state is worse than not running at all.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("corrupt state record: {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;
