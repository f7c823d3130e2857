//! Attribute values for declared resources

use serde_json::Value;

/// A desired attribute value.
///
/// Either a concrete JSON value, or a reference to an attribute exported
/// by a resource in another stack. Imports are resolved against the
/// upstream stack's persisted state before planning; the planner only
/// ever sees concrete values.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Concrete JSON value
    Literal(Value),
    /// Cross-stack reference
    Import(ImportRef),
}

/// Reference to an attribute of a resource applied in another stack.
///
/// The attribute name `external_id` is reserved: it resolves to the
/// provider-assigned handle of the upstream resource rather than to a
/// declared attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    /// Upstream stack identifier
    pub stack: String,
    /// Resource identifier within the upstream stack
    pub resource: String,
    /// Attribute name to read from the applied record
    pub attribute: String,
}

impl AttrValue {
    /// Concrete attribute value
    pub fn literal(value: impl Into<Value>) -> Self {
        AttrValue::Literal(value.into())
    }

    /// Cross-stack import reference
    pub fn import(
        stack: impl Into<String>,
        resource: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        AttrValue::Import(ImportRef {
            stack: stack.into(),
            resource: resource.into(),
            attribute: attribute.into(),
        })
    }

    /// Returns the literal value, if this is one
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            AttrValue::Literal(value) => Some(value),
            AttrValue::Import(_) => None,
        }
    }

    /// Returns the import reference, if this is one
    pub fn as_import(&self) -> Option<&ImportRef> {
        match self {
            AttrValue::Literal(_) => None,
            AttrValue::Import(import) => Some(import),
        }
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        AttrValue::Literal(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Literal(Value::from(value))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Literal(Value::from(value))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Literal(Value::from(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Literal(Value::from(value))
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        AttrValue::Literal(Value::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Literal(Value::from(value))
    }
}

impl From<ImportRef> for AttrValue {
    fn from(import: ImportRef) -> Self {
        AttrValue::Import(import)
    }
}
