//! Resource graph error types

use thiserror::Error;

/// Errors raised while constructing or validating a resource graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("duplicate resource identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("invalid resource identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("resource '{resource}' depends on unknown resource '{dependency}'")]
    UnknownDependency { resource: String, dependency: String },

    #[error("dependency cycle detected: {0}")]
    CycleDetected(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
