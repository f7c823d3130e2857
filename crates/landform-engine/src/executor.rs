//! Plan execution
//!
//! Dispatches ready changes onto a bounded set of worker tasks. A change
//! becomes ready once every change it waits for has applied; a failure
//! cascades a skip to everything downstream while independent branches
//! run to completion. Every successful outcome is persisted before any
//! dependent starts, so a crash mid-run leaves state consistent with
//! what actually exists.

use crate::error::{EngineError, Result};
use crate::plan::{Change, ChangeKind, Plan};
use crate::provider::{Provider, ProviderError, ResourceSpec};
use chrono::Utc;
use landform_state::{RecordStatus, StateError, StateRecord, StateStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Worker pool configuration for one run
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Maximum number of provider calls in flight at once
    pub max_concurrency: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Terminal outcome of one change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The provider call succeeded and state was persisted
    Applied,
    /// Nothing to do (no-op change)
    Skipped,
    /// A change this one waits for, directly or transitively, failed
    SkippedDueToFailure { failed: String },
    /// The provider call errored; a failed record was persisted
    Failed { reason: String },
    /// Cancellation was requested before this change started
    Cancelled,
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every change applied or was a no-op
    Success,
    /// At least one change failed or was skipped because of a failure
    PartialFailure,
    /// The run was cancelled before finishing, without failures
    Cancelled,
}

/// Aggregated per-resource outcomes for one run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    outcomes: BTreeMap<String, Outcome>,

    /// Wall-clock execution time in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn status(&self) -> RunStatus {
        let mut cancelled = false;
        for outcome in self.outcomes.values() {
            match outcome {
                Outcome::Failed { .. } | Outcome::SkippedDueToFailure { .. } => {
                    return RunStatus::PartialFailure;
                }
                Outcome::Cancelled => cancelled = true,
                _ => {}
            }
        }
        if cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Success
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == RunStatus::Success
    }

    pub fn outcome(&self, id: &str) -> Option<&Outcome> {
        self.outcomes.get(id)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.outcomes.iter().map(|(id, o)| (id.as_str(), o))
    }

    /// Identifiers whose provider call errored
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Failed { .. }))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Identifiers skipped because something they depend on failed
    pub fn skipped_due_to_failure(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::SkippedDueToFailure { .. }))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn applied(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Applied))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Apply a plan against a provider.
///
/// Per-resource provider failures are recorded in the result; only state
/// store errors abort the run, since every later diff would be computed
/// from wrong facts. In-flight provider calls always run to completion,
/// cancellation only stops new dispatches.
pub async fn apply(
    plan: &Plan,
    provider: Arc<dyn Provider>,
    store: &StateStore,
    options: &ExecuteOptions,
    cancel: &CancellationToken,
) -> Result<ExecutionResult> {
    let start = Instant::now();
    let limit = options.max_concurrency.max(1);

    // unsatisfied predecessors per change, and the reverse edges
    let mut pending: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for change in plan.changes() {
        let waits: HashSet<&str> = change
            .wait_for
            .iter()
            .map(String::as_str)
            .filter(|wait| plan.get(wait).is_some())
            .collect();
        for &wait in &waits {
            dependents.entry(wait).or_default().push(change.id.as_str());
        }
        pending.insert(change.id.as_str(), waits);
    }

    let mut ready: VecDeque<&Change> = plan
        .changes()
        .iter()
        .filter(|change| pending[change.id.as_str()].is_empty())
        .collect();

    let mut outcomes: BTreeMap<String, Outcome> = BTreeMap::new();
    let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
    let mut running: HashMap<tokio::task::Id, String> = HashMap::new();
    let mut state_error: Option<EngineError> = None;

    loop {
        while state_error.is_none() && !cancel.is_cancelled() {
            let Some(change) = ready.pop_front() else { break };
            if change.kind == ChangeKind::NoOp {
                tracing::debug!(id = %change.id, "no changes");
                outcomes.insert(change.id.clone(), Outcome::Skipped);
                release(&change.id, plan, &dependents, &mut pending, &outcomes, &mut ready);
                continue;
            }
            if tasks.len() >= limit {
                ready.push_front(change);
                break;
            }
            tracing::debug!(id = %change.id, kind = %change.kind, "dispatching change");
            let handle = tasks.spawn(execute_change(
                change.clone(),
                Arc::clone(&provider),
                store.clone(),
                plan.stack.clone(),
            ));
            running.insert(handle.id(), change.id.clone());
        }

        let Some(joined) = tasks.join_next_with_id().await else {
            if ready.is_empty() || cancel.is_cancelled() || state_error.is_some() {
                break;
            }
            continue;
        };

        let (id, output) = match joined {
            Ok((task_id, output)) => {
                let Some(id) = running.remove(&task_id) else {
                    continue;
                };
                (id, output)
            }
            Err(join_error) => {
                let Some(id) = running.remove(&join_error.id()) else {
                    continue;
                };
                tracing::warn!(id = %id, error = %join_error, "worker task aborted");
                let reason = format!("worker task aborted: {join_error}");
                (id, TaskOutput::Failed { reason })
            }
        };

        match output {
            TaskOutput::Applied => {
                tracing::debug!(id = %id, "change applied");
                outcomes.insert(id.clone(), Outcome::Applied);
                release(&id, plan, &dependents, &mut pending, &outcomes, &mut ready);
            }
            TaskOutput::Failed { reason } => {
                tracing::warn!(id = %id, reason = %reason, "change failed");
                outcomes.insert(id.clone(), Outcome::Failed { reason });
                cascade_skip(&id, &dependents, &mut outcomes);
            }
            TaskOutput::State(error) => {
                tracing::error!(id = %id, error = %error, "state store failure, stopping run");
                if state_error.is_none() {
                    state_error = Some(EngineError::State(error));
                }
            }
        }
    }

    if let Some(error) = state_error {
        return Err(error);
    }

    // anything still without an outcome was never started
    for change in plan.changes() {
        outcomes
            .entry(change.id.clone())
            .or_insert(Outcome::Cancelled);
    }

    let result = ExecutionResult {
        outcomes,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    tracing::info!(
        stack = %plan.stack,
        status = ?result.status(),
        applied = result.applied().len(),
        failed = result.failed().len(),
        duration_ms = result.duration_ms,
        "plan execution finished"
    );
    Ok(result)
}

/// Mark dependents whose last unsatisfied predecessor just applied
fn release<'p>(
    id: &str,
    plan: &'p Plan,
    dependents: &HashMap<&str, Vec<&'p str>>,
    pending: &mut HashMap<&'p str, HashSet<&'p str>>,
    outcomes: &BTreeMap<String, Outcome>,
    ready: &mut VecDeque<&'p Change>,
) {
    let Some(waiting) = dependents.get(id) else {
        return;
    };
    for &dependent in waiting {
        if outcomes.contains_key(dependent) {
            continue;
        }
        if let Some(waits) = pending.get_mut(dependent) {
            waits.remove(id);
            if waits.is_empty() {
                if let Some(change) = plan.get(dependent) {
                    ready.push_back(change);
                }
            }
        }
    }
}

/// Skip every direct and transitive dependent of a failed change
fn cascade_skip(
    failed: &str,
    dependents: &HashMap<&str, Vec<&str>>,
    outcomes: &mut BTreeMap<String, Outcome>,
) {
    let mut queue: VecDeque<&str> = VecDeque::from([failed]);
    while let Some(current) = queue.pop_front() {
        let Some(waiting) = dependents.get(current) else {
            continue;
        };
        for &dependent in waiting {
            if outcomes.contains_key(dependent) {
                continue;
            }
            tracing::debug!(id = dependent, failed, "skipping dependent of failed change");
            outcomes.insert(
                dependent.to_string(),
                Outcome::SkippedDueToFailure {
                    failed: failed.to_string(),
                },
            );
            queue.push_back(dependent);
        }
    }
}

enum TaskOutput {
    Applied,
    Failed { reason: String },
    State(StateError),
}

/// Run one change to a terminal outcome, persisting the result before
/// returning so dependents only ever see durable state.
async fn execute_change(
    change: Change,
    provider: Arc<dyn Provider>,
    store: StateStore,
    stack: String,
) -> TaskOutput {
    let spec = ResourceSpec {
        id: change.id.clone(),
        resource_type: change.resource_type.clone(),
        attributes: change.desired.clone().unwrap_or_default(),
    };

    match change.kind {
        ChangeKind::Create => match provider.create(&spec).await {
            Ok(external_id) => persist_applied(&store, &stack, &change, external_id).await,
            Err(error) => persist_failed(&store, &stack, &change, &error).await,
        },
        ChangeKind::Update => {
            let Some(prior) = change.prior.as_ref() else {
                return TaskOutput::Failed {
                    reason: "update planned without a prior record".to_string(),
                };
            };
            match provider.update(&spec, prior).await {
                Ok(external_id) => persist_applied(&store, &stack, &change, external_id).await,
                Err(error) => persist_failed(&store, &stack, &change, &error).await,
            }
        }
        ChangeKind::Replace => {
            let Some(prior) = change.prior.as_ref() else {
                return TaskOutput::Failed {
                    reason: "replace planned without a prior record".to_string(),
                };
            };
            // tear down first, and make the teardown durable before the
            // create half starts
            if prior.external_id.is_some() && prior.status != RecordStatus::Deleted {
                if let Err(error) = provider.delete(&change.resource_type, prior).await {
                    return persist_failed(&store, &stack, &change, &error).await;
                }
            }
            let mut tombstone = prior.clone();
            tombstone.external_id = None;
            tombstone.status = RecordStatus::Deleted;
            tombstone.updated_at = Utc::now();
            if let Err(error) = store.save(&stack, &tombstone).await {
                return TaskOutput::State(error);
            }
            match provider.create(&spec).await {
                Ok(external_id) => persist_applied(&store, &stack, &change, external_id).await,
                Err(error) => {
                    let mut failed = tombstone;
                    failed.status = RecordStatus::Failed;
                    failed.updated_at = Utc::now();
                    if let Err(state_error) = store.save(&stack, &failed).await {
                        return TaskOutput::State(state_error);
                    }
                    TaskOutput::Failed {
                        reason: error.to_string(),
                    }
                }
            }
        }
        ChangeKind::Delete => {
            let Some(prior) = change.prior.as_ref() else {
                return TaskOutput::Failed {
                    reason: "delete planned without a prior record".to_string(),
                };
            };
            // a record without an external handle has nothing to destroy
            if prior.external_id.is_some() && prior.status != RecordStatus::Deleted {
                if let Err(error) = provider.delete(&change.resource_type, prior).await {
                    return persist_failed(&store, &stack, &change, &error).await;
                }
            }
            match store.remove(&stack, &change.id).await {
                Ok(()) => TaskOutput::Applied,
                Err(error) => TaskOutput::State(error),
            }
        }
        // no-ops are settled inline by the scheduler
        ChangeKind::NoOp => TaskOutput::Applied,
    }
}

async fn persist_applied(
    store: &StateStore,
    stack: &str,
    change: &Change,
    external_id: String,
) -> TaskOutput {
    let now = Utc::now();
    let prior = change.prior.as_ref();
    let record = StateRecord {
        id: change.id.clone(),
        resource_type: change.resource_type.clone(),
        external_id: Some(external_id),
        status: RecordStatus::Active,
        attributes: change.desired.clone().unwrap_or_default(),
        depends_on: change.wait_for.clone(),
        version: prior.map(|r| r.version + 1).unwrap_or(1),
        created_at: prior.map(|r| r.created_at).unwrap_or(now),
        updated_at: now,
    };
    match store.save(stack, &record).await {
        Ok(()) => TaskOutput::Applied,
        Err(error) => TaskOutput::State(error),
    }
}

/// Failures stay visible in state for the next run
async fn persist_failed(
    store: &StateStore,
    stack: &str,
    change: &Change,
    error: &ProviderError,
) -> TaskOutput {
    let record = match change.prior.as_ref() {
        Some(prior) => {
            let mut record = prior.clone();
            record.status = RecordStatus::Failed;
            record.updated_at = Utc::now();
            record
        }
        None => StateRecord::new(&change.id, &change.resource_type)
            .with_status(RecordStatus::Failed)
            .with_depends_on(change.wait_for.clone()),
    };
    if let Err(state_error) = store.save(stack, &record).await {
        return TaskOutput::State(state_error);
    }
    TaskOutput::Failed {
        reason: error.to_string(),
    }
}
