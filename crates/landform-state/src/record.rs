//! Persisted state records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute mapping as last applied by the provider
pub type AppliedAttributes = BTreeMap<String, Value>;

/// Persisted record of a resource's last apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Logical resource identifier
    pub id: String,

    /// Resource type tag
    pub resource_type: String,

    /// Provider-assigned handle, set once a create has succeeded
    pub external_id: Option<String>,

    /// Current status
    pub status: RecordStatus,

    /// Last successfully applied attributes
    pub attributes: AppliedAttributes,

    /// Dependencies as declared at apply time. Kept so deletions can be
    /// ordered after the graph has forgotten the resource.
    pub depends_on: Vec<String>,

    /// Incremented on each successful apply
    pub version: u64,

    /// When the resource was first applied
    pub created_at: DateTime<Utc>,

    /// Last write timestamp
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            external_id: None,
            status: RecordStatus::Active,
            attributes: AppliedAttributes::new(),
            depends_on: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attributes(mut self, attributes: AppliedAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_depends_on(mut self, depends_on: Vec<String>) -> Self {
        self.depends_on = depends_on;
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Whether the last apply attempt for this resource errored
    pub fn is_failed(&self) -> bool {
        self.status == RecordStatus::Failed
    }
}

/// Status of a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Applied and live
    Active,
    /// The last apply attempt errored; kept visible for the next run
    Failed,
    /// The external resource was destroyed but the identifier survives,
    /// written between the two halves of a replace
    Deleted,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Active => write!(f, "active"),
            RecordStatus::Failed => write!(f, "failed"),
            RecordStatus::Deleted => write!(f, "deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_builder() {
        let record = StateRecord::new("net", "network")
            .with_external_id("vpc-0a1b2c")
            .with_attribute("cidr", json!("10.2.0.0/16"))
            .with_version(1);

        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(record.external_id.as_deref(), Some("vpc-0a1b2c"));
        assert_eq!(record.version, 1);
        assert!(!record.is_failed());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&RecordStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }
}
