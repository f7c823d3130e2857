//! Plan computation
//!
//! Walks the graph in topological order comparing desired attributes
//! against prior records, then appends deletes for records the graph no
//! longer mentions, in reverse dependency order among themselves. Never
//! mutates state and never calls a provider.

use crate::plan::{Change, ChangeKind, Plan};
use crate::provider::ProviderSchema;
use landform_graph::ResourceGraph;
use landform_state::{AppliedAttributes, RecordStatus, StateRecord};
use std::collections::{BTreeMap, BTreeSet};

/// Resolved desired attributes per resource identifier
pub type ResolvedAttributes = BTreeMap<String, AppliedAttributes>;

/// Diff a desired graph against prior state.
///
/// Always produces exactly one change per graph resource plus one delete
/// per orphaned record, even when everything is a no-op.
pub fn plan(
    stack: &str,
    graph: &ResourceGraph,
    resolved: &ResolvedAttributes,
    prior: &BTreeMap<String, StateRecord>,
    schema: &ProviderSchema,
) -> Plan {
    let mut changes = Vec::with_capacity(graph.len());

    for id in graph.topological_order() {
        let Some(resource) = graph.get(id) else {
            continue;
        };
        let desired = resolved.get(id).cloned().unwrap_or_default();
        let record = prior.get(id);
        // a record left behind by the delete half of a replace counts as
        // absent
        let live = record.filter(|r| r.status != RecordStatus::Deleted);

        let kind = match live {
            None => ChangeKind::Create,
            Some(r) if r.is_failed() && r.external_id.is_none() => ChangeKind::Create,
            Some(r)
                if has_immutable_diff(schema, &resource.resource_type, &desired, &r.attributes) =>
            {
                ChangeKind::Replace
            }
            Some(r) if r.is_failed() => ChangeKind::Update,
            Some(r) if r.attributes != desired => ChangeKind::Update,
            Some(_) => ChangeKind::NoOp,
        };

        changes.push(Change {
            id: id.to_string(),
            resource_type: resource.resource_type.clone(),
            kind,
            desired: Some(desired),
            prior: record.cloned(),
            wait_for: resource.depends_on.clone(),
        });
    }

    let removed: BTreeMap<&str, &StateRecord> = prior
        .iter()
        .filter(|(id, _)| !graph.contains(id))
        .map(|(id, record)| (id.as_str(), record))
        .collect();

    for id in reverse_delete_order(&removed) {
        let record = removed[id];
        // nothing is torn down while another record still references it
        let wait_for: Vec<String> = prior
            .values()
            .filter(|r| r.id != id && r.depends_on.iter().any(|d| d == id))
            .map(|r| r.id.clone())
            .collect();

        changes.push(Change {
            id: id.to_string(),
            resource_type: record.resource_type.clone(),
            kind: ChangeKind::Delete,
            desired: None,
            prior: Some(record.clone()),
            wait_for,
        });
    }

    let plan = Plan::new(stack, changes);
    tracing::debug!(stack, summary = %plan.summary(), "computed plan");
    plan
}

/// A differing value, or a value present on only one side, on any
/// attribute the schema declares immutable for the type.
fn has_immutable_diff(
    schema: &ProviderSchema,
    resource_type: &str,
    desired: &AppliedAttributes,
    applied: &AppliedAttributes,
) -> bool {
    desired
        .keys()
        .chain(applied.keys())
        .any(|attr| schema.is_immutable(resource_type, attr) && desired.get(attr) != applied.get(attr))
}

/// Kahn's algorithm over reversed edges within the removed set: a record
/// is ready to delete once no other removed record depends on it.
/// Lexicographic tie-breaking keeps plans reproducible.
fn reverse_delete_order<'a>(removed: &BTreeMap<&'a str, &'a StateRecord>) -> Vec<&'a str> {
    let mut dependent_count: BTreeMap<&str, usize> =
        removed.keys().map(|&id| (id, 0)).collect();
    for record in removed.values() {
        for dependency in &record.depends_on {
            if record.id != *dependency {
                if let Some(count) = dependent_count.get_mut(dependency.as_str()) {
                    *count += 1;
                }
            }
        }
    }

    let mut ready: BTreeSet<&str> = dependent_count
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut order = Vec::with_capacity(removed.len());
    while let Some(id) = ready.pop_first() {
        order.push(id);
        for dependency in &removed[id].depends_on {
            if let Some(count) = dependent_count.get_mut(dependency.as_str()) {
                if *count > 0 {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependency.as_str());
                    }
                }
            }
        }
    }

    // state written by this engine is acyclic; tolerate hand-edited files
    if order.len() != removed.len() {
        for &id in removed.keys() {
            if !order.contains(&id) {
                order.push(id);
            }
        }
    }
    order
}
