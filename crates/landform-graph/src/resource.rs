//! Declared resources

use crate::value::AttrValue;
use std::collections::BTreeMap;

/// Desired attribute mapping for one resource
pub type Attributes = BTreeMap<String, AttrValue>;

/// A declared unit of infrastructure: a logical identifier, a type tag,
/// desired attributes and the identifiers of resources it depends on.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Logical identifier, unique within the graph
    pub id: String,

    /// Resource type tag (e.g. "network", "compute-cluster")
    pub resource_type: String,

    /// Desired attributes
    pub attributes: Attributes,

    /// Identifiers of resources this one depends on, in declaration order
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            attributes: Attributes::new(),
            depends_on: Vec::new(),
        }
    }

    /// Set a desired attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Declare a dependency on another resource in the same graph
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }
}
