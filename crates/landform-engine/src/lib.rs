//! Landform reconciliation engine
//!
//! Turns a declared resource graph into provider calls: diff against
//! persisted state, compute an ordered change plan, apply it on a
//! bounded worker pool, and record every per-resource outcome.
//!
//! ```text
//! caller ──▶ Reconciler ──▶ planner ──▶ Plan
//!                │                       │
//!                │                       ▼
//!                │                   executor ──▶ Provider
//!                │                       │     (create/update/delete)
//!                ▼                       ▼
//!            StateStore ◀── per-change record writes
//! ```
//!
//! Nothing rolls back on partial failure: applied resources stay
//! applied, failed ones keep a `failed` record, and the next run retries
//! exactly the failed and skipped work.

pub mod driver;
pub mod error;
pub mod executor;
pub mod plan;
pub mod planner;
pub mod provider;

// Re-exports
pub use driver::{ReconcileOptions, Reconciler};
pub use error::{EngineError, Result};
pub use executor::{ExecuteOptions, ExecutionResult, Outcome, RunStatus};
pub use plan::{Change, ChangeKind, Plan, PlanSummary};
pub use planner::ResolvedAttributes;
pub use provider::{Provider, ProviderError, ProviderResult, ProviderSchema, ResourceSpec};
