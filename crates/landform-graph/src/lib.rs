//! Resource graph model for Landform stacks.
//!
//! Callers declare resources through [`GraphBuilder`] and finalize the set
//! into an immutable [`ResourceGraph`] with a deterministic topological
//! order. All configuration validation (duplicate identifiers, unknown
//! dependencies, cycles) happens here, before any planning or provider
//! call is made.

pub mod error;
pub mod graph;
pub mod resource;
pub mod value;

// Re-exports
pub use error::{GraphError, Result};
pub use graph::{GraphBuilder, ResourceGraph};
pub use resource::{Attributes, Resource};
pub use value::{AttrValue, ImportRef};
