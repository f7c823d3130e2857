//! Durable state for Landform stacks.
//!
//! Records what each resource looked like after its last apply: the
//! provider-assigned handle, the applied attributes and an apply counter.
//! The store is the source of truth for "what currently exists"; the
//! planner diffs desired graphs against it. Records are written one file
//! per resource so parallel branches of a run can persist their outcomes
//! independently.

pub mod error;
pub mod record;
pub mod store;

// Re-exports
pub use error::{Result, StateError};
pub use record::{AppliedAttributes, RecordStatus, StateRecord};
pub use store::StateStore;
