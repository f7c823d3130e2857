//! Reconciliation driver
//!
//! One run is load, resolve, plan, apply. Nothing rolls back on partial
//! failure: already-applied resources converge to no-ops on the next run,
//! so re-invoking the driver is the retry mechanism.

use crate::error::{EngineError, Result};
use crate::executor::{self, ExecuteOptions, ExecutionResult};
use crate::plan::Plan;
use crate::planner::{self, ResolvedAttributes};
use crate::provider::Provider;
use landform_graph::{AttrValue, ResourceGraph};
use landform_state::{AppliedAttributes, RecordStatus, StateRecord, StateStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Reserved import attribute resolving to the provider-assigned handle
const IMPORT_EXTERNAL_ID: &str = "external_id";

/// Reconciler configuration, validated once at construction
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Maximum provider calls in flight at once
    pub max_concurrency: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Drives one stack through load, plan and apply
pub struct Reconciler {
    store: StateStore,
    provider: Arc<dyn Provider>,
    options: ReconcileOptions,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(store: StateStore, provider: Arc<dyn Provider>) -> Self {
        Self {
            store,
            provider,
            options: ReconcileOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Build with explicit options. Fails when `max_concurrency` is zero.
    pub fn with_options(
        store: StateStore,
        provider: Arc<dyn Provider>,
        options: ReconcileOptions,
    ) -> Result<Self> {
        if options.max_concurrency == 0 {
            return Err(EngineError::InvalidOptions(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            store,
            provider,
            options,
            cancel: CancellationToken::new(),
        })
    }

    /// Token observed between dispatches. In-flight provider calls always
    /// run to completion; cancelling only stops new changes from
    /// starting.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Compute the plan for a stack without touching the provider
    pub async fn plan(&self, stack: &str, graph: &ResourceGraph) -> Result<Plan> {
        let prior = self.store.load(stack).await?;
        let resolved = self.resolve_imports(graph).await?;
        let plan = planner::plan(stack, graph, &resolved, &prior, &self.provider.schema());
        tracing::info!(stack, summary = %plan.summary(), "planned stack");
        Ok(plan)
    }

    /// Plan and apply a stack, returning the per-resource outcomes
    pub async fn apply(&self, stack: &str, graph: &ResourceGraph) -> Result<ExecutionResult> {
        let plan = self.plan(stack, graph).await?;
        let options = ExecuteOptions {
            max_concurrency: self.options.max_concurrency,
        };
        let result = executor::apply(
            &plan,
            Arc::clone(&self.provider),
            &self.store,
            &options,
            &self.cancel,
        )
        .await?;
        tracing::info!(
            stack,
            status = ?result.status(),
            duration_ms = result.duration_ms,
            "reconciliation finished"
        );
        Ok(result)
    }

    /// Read the persisted records of a stack, e.g. to inspect its outputs
    pub async fn state(&self, stack: &str) -> Result<BTreeMap<String, StateRecord>> {
        Ok(self.store.load(stack).await?)
    }

    /// Replace import references with concrete values read from the
    /// upstream stacks' applied records. Fails before any provider call
    /// when a reference cannot be satisfied.
    async fn resolve_imports(&self, graph: &ResourceGraph) -> Result<ResolvedAttributes> {
        let mut upstream: HashMap<String, BTreeMap<String, StateRecord>> = HashMap::new();
        let mut resolved = ResolvedAttributes::new();

        for resource in graph.iter() {
            let mut attributes = AppliedAttributes::new();
            for (name, value) in &resource.attributes {
                match value {
                    AttrValue::Literal(literal) => {
                        attributes.insert(name.clone(), literal.clone());
                    }
                    AttrValue::Import(import) => {
                        if !upstream.contains_key(&import.stack) {
                            let records = self.store.load(&import.stack).await?;
                            upstream.insert(import.stack.clone(), records);
                        }
                        let record = upstream[&import.stack]
                            .get(&import.resource)
                            .filter(|r| r.status == RecordStatus::Active);
                        let imported = record
                            .and_then(|r| {
                                if import.attribute == IMPORT_EXTERNAL_ID {
                                    r.external_id.clone().map(serde_json::Value::String)
                                } else {
                                    r.attributes.get(&import.attribute).cloned()
                                }
                            })
                            .ok_or_else(|| EngineError::UnresolvedImport {
                                resource: resource.id.clone(),
                                attribute: name.clone(),
                                stack: import.stack.clone(),
                                target: format!("{}.{}", import.resource, import.attribute),
                            })?;
                        tracing::debug!(
                            resource = %resource.id,
                            attribute = %name,
                            stack = %import.stack,
                            "resolved cross-stack import"
                        );
                        attributes.insert(name.clone(), imported);
                    }
                }
            }
            resolved.insert(resource.id.clone(), attributes);
        }
        Ok(resolved)
    }
}
