//! Provider capability trait
//!
//! The engine never assumes a specific cloud API. It requires exactly the
//! tri-operation contract below plus a declaration of which attributes
//! cannot change in place. Retries are left to implementations; the
//! engine's retry mechanism is re-running reconciliation.

use async_trait::async_trait;
use landform_state::{AppliedAttributes, StateRecord};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Resolved view of one resource handed to a provider call
#[derive(Debug, Clone)]
pub struct ResourceSpec {
    /// Logical identifier, unique within the stack. Doubles as an
    /// idempotency hint for providers that can look resources up by name.
    pub id: String,

    /// Resource type tag
    pub resource_type: String,

    /// Desired attributes with imports resolved
    pub attributes: AppliedAttributes,
}

/// Abstract provisioning capability
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name (e.g. "aws", "local")
    fn name(&self) -> &str;

    /// Declares which attributes cannot be updated in place per type
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::default()
    }

    /// Create the resource, returning its provider-assigned handle
    async fn create(&self, spec: &ResourceSpec) -> ProviderResult<String>;

    /// Update the resource in place, returning its (possibly new) handle
    async fn update(&self, spec: &ResourceSpec, prior: &StateRecord) -> ProviderResult<String>;

    /// Destroy the resource behind the record's external handle
    async fn delete(&self, resource_type: &str, record: &StateRecord) -> ProviderResult<()>;
}

/// Per-type attribute capabilities declared by a provider
#[derive(Debug, Clone, Default)]
pub struct ProviderSchema {
    immutable: BTreeMap<String, BTreeSet<String>>,
}

impl ProviderSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute of a resource type that cannot be updated in
    /// place. A change to it forces a replace.
    pub fn immutable(
        mut self,
        resource_type: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.immutable
            .entry(resource_type.into())
            .or_default()
            .insert(attribute.into());
        self
    }

    pub fn is_immutable(&self, resource_type: &str, attribute: &str) -> bool {
        self.immutable
            .get(resource_type)
            .is_some_and(|set| set.contains(attribute))
    }
}

/// Errors surfaced by provider implementations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API error: {0}")]
    Api(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unsupported resource type: {0}")]
    UnsupportedType(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
