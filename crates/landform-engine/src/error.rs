//! Engine error types

use thiserror::Error;

/// Errors that abort a reconciliation run before or during execution.
///
/// Per-resource provider failures are not in here: those are recorded as
/// outcomes in the [`ExecutionResult`](crate::executor::ExecutionResult)
/// and never abort the run.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid resource graph: {0}")]
    Graph(#[from] landform_graph::GraphError),

    #[error("state store error: {0}")]
    State(#[from] landform_state::StateError),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error(
        "resource '{resource}' attribute '{attribute}': cannot resolve '{target}' from stack '{stack}'"
    )]
    UnresolvedImport {
        resource: String,
        attribute: String,
        stack: String,
        target: String,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
