//! Change plans

use landform_state::{AppliedAttributes, StateRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of planned action for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// No prior record exists
    Create,
    /// Attributes differ from the prior record, or a failed apply is
    /// being retried
    Update,
    /// An immutable attribute differs: delete then create under the same
    /// identifier
    Replace,
    /// The identifier no longer appears in the graph
    Delete,
    /// Desired and applied attributes are identical
    NoOp,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "create"),
            ChangeKind::Update => write!(f, "update"),
            ChangeKind::Replace => write!(f, "replace"),
            ChangeKind::Delete => write!(f, "delete"),
            ChangeKind::NoOp => write!(f, "no-op"),
        }
    }
}

/// A planned action for one resource
#[derive(Debug, Clone, Serialize)]
pub struct Change {
    /// Resource identifier
    pub id: String,

    /// Resource type tag
    pub resource_type: String,

    pub kind: ChangeKind,

    /// Desired attributes with imports resolved. Absent for deletes.
    pub desired: Option<AppliedAttributes>,

    /// Prior record, when one exists
    pub prior: Option<StateRecord>,

    /// Identifiers whose changes must complete successfully before this
    /// one may start. For creates and updates these are the declared
    /// dependencies; for deletes, everything whose prior record still
    /// referenced this resource.
    pub wait_for: Vec<String>,
}

/// Ordered set of changes for one stack: creates and updates in
/// dependency order, then deletes in reverse dependency order.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Stack identifier the plan was computed for
    pub stack: String,

    changes: Vec<Change>,

    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Plan {
    pub(crate) fn new(stack: impl Into<String>, changes: Vec<Change>) -> Self {
        let index = changes
            .iter()
            .enumerate()
            .map(|(i, change)| (change.id.clone(), i))
            .collect();
        Self {
            stack: stack.into(),
            changes,
            index,
        }
    }

    /// Changes in execution order
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn get(&self, id: &str) -> Option<&Change> {
        self.index.get(id).map(|&i| &self.changes[i])
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether anything other than no-ops is planned
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.kind != ChangeKind::NoOp)
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for change in &self.changes {
            match change.kind {
                ChangeKind::Create => summary.create += 1,
                ChangeKind::Update => summary.update += 1,
                ChangeKind::Replace => summary.replace += 1,
                ChangeKind::Delete => summary.delete += 1,
                ChangeKind::NoOp => summary.no_change += 1,
            }
        }
        summary
    }
}

/// Counts of planned actions by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}
