use async_trait::async_trait;
use landform_engine::{Provider, ProviderError, ProviderResult, ProviderSchema, ResourceSpec};
use landform_graph::{GraphBuilder, Resource, ResourceGraph};
use landform_state::StateRecord;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory provider that records every call and can be told to fail
/// specific resources.
#[derive(Default)]
pub struct MockProvider {
    schema: ProviderSchema,
    fail: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn with_schema(mut self, schema: ProviderSchema) -> Self {
        self.schema = schema;
        self
    }

    #[allow(dead_code)]
    pub fn fail_on(mut self, id: &str) -> Self {
        self.fail.insert(id.to_string());
        self
    }

    #[allow(dead_code)]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every provider call so far, as "operation:id" in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of calls that were ever in flight at once
    #[allow(dead_code)]
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: &str, id: &str) -> ProviderResult<()> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.calls.lock().unwrap().push(format!("{operation}:{id}"));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail.contains(id) {
            return Err(ProviderError::Api(format!("induced failure for {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn schema(&self) -> ProviderSchema {
        self.schema.clone()
    }

    async fn create(&self, spec: &ResourceSpec) -> ProviderResult<String> {
        self.enter("create", &spec.id).await?;
        let serial = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("ext-{}-{serial}", spec.id))
    }

    async fn update(&self, spec: &ResourceSpec, prior: &StateRecord) -> ProviderResult<String> {
        self.enter("update", &spec.id).await?;
        Ok(prior
            .external_id
            .clone()
            .unwrap_or_else(|| format!("ext-{}", spec.id)))
    }

    async fn delete(&self, _resource_type: &str, record: &StateRecord) -> ProviderResult<()> {
        self.enter("delete", &record.id).await
    }
}

pub fn graph_of(resources: Vec<Resource>) -> ResourceGraph {
    let mut builder = GraphBuilder::new();
    for resource in resources {
        builder.add_resource(resource).unwrap();
    }
    builder.finalize().unwrap()
}
