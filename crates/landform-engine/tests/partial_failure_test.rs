mod common;

use common::{MockProvider, graph_of};
use landform_engine::{Outcome, Reconciler, RunStatus};
use landform_graph::Resource;
use landform_state::{RecordStatus, StateStore};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_failure_skips_dependents_but_not_independent_branches() {
    let temp_dir = tempdir().unwrap();
    let provider = Arc::new(MockProvider::new().fail_on("bad"));
    let reconciler = Reconciler::new(StateStore::new(temp_dir.path()), provider.clone());

    let graph = graph_of(vec![
        Resource::new("bad", "network"),
        Resource::new("child", "service").depends_on("bad"),
        Resource::new("solo", "network"),
    ]);

    let result = reconciler.apply("production", &graph).await.unwrap();
    assert_eq!(result.status(), RunStatus::PartialFailure);
    assert!(matches!(
        result.outcome("bad"),
        Some(Outcome::Failed { .. })
    ));
    assert_eq!(
        result.outcome("child"),
        Some(&Outcome::SkippedDueToFailure {
            failed: "bad".to_string()
        })
    );
    assert_eq!(result.outcome("solo"), Some(&Outcome::Applied));
    assert_eq!(result.failed(), vec!["bad"]);
    assert_eq!(result.skipped_due_to_failure(), vec!["child"]);

    // the skipped dependent was never attempted
    let calls = provider.calls();
    assert!(!calls.iter().any(|c| c.contains("child")));
}

#[tokio::test]
async fn test_failure_cascades_transitively() {
    let temp_dir = tempdir().unwrap();
    let provider = Arc::new(MockProvider::new().fail_on("a"));
    let reconciler = Reconciler::new(StateStore::new(temp_dir.path()), provider.clone());

    let graph = graph_of(vec![
        Resource::new("a", "network"),
        Resource::new("b", "service").depends_on("a"),
        Resource::new("c", "load-balancer").depends_on("b"),
    ]);

    let result = reconciler.apply("production", &graph).await.unwrap();
    assert_eq!(
        result.outcome("b"),
        Some(&Outcome::SkippedDueToFailure {
            failed: "a".to_string()
        })
    );
    assert_eq!(
        result.outcome("c"),
        Some(&Outcome::SkippedDueToFailure {
            failed: "a".to_string()
        })
    );
}

#[tokio::test]
async fn test_failures_are_recorded_and_applied_work_is_durable() {
    let temp_dir = tempdir().unwrap();
    let provider = Arc::new(MockProvider::new().fail_on("app"));
    let reconciler = Reconciler::new(StateStore::new(temp_dir.path()), provider.clone());

    let graph = graph_of(vec![
        Resource::new("net", "network").with_attribute("cidr", "10.2.0.0/16"),
        Resource::new("app", "service").depends_on("net"),
    ]);

    let result = reconciler.apply("production", &graph).await.unwrap();
    assert_eq!(result.status(), RunStatus::PartialFailure);

    // net applied and was persisted even though a later change failed
    let state = reconciler.state("production").await.unwrap();
    assert_eq!(state["net"].status, RecordStatus::Active);
    assert_eq!(state["net"].version, 1);

    // the failure stays visible rather than being dropped
    assert_eq!(state["app"].status, RecordStatus::Failed);
    assert!(state["app"].external_id.is_none());
}

#[tokio::test]
async fn test_rerun_after_failure_retries_only_failed_work() {
    let temp_dir = tempdir().unwrap();
    let store = StateStore::new(temp_dir.path());

    let graph = graph_of(vec![
        Resource::new("bad", "network"),
        Resource::new("child", "service").depends_on("bad"),
        Resource::new("solo", "network"),
    ]);

    let failing = Arc::new(MockProvider::new().fail_on("bad"));
    let reconciler = Reconciler::new(store.clone(), failing);
    reconciler.apply("production", &graph).await.unwrap();

    // the cause is fixed; the next run touches only the failed and
    // skipped resources
    let healthy = Arc::new(MockProvider::new());
    let reconciler = Reconciler::new(store, healthy.clone());
    let plan = reconciler.plan("production", &graph).await.unwrap();
    assert_eq!(plan.summary().no_change, 1);
    assert_eq!(plan.summary().create, 2);

    let result = reconciler.apply("production", &graph).await.unwrap();
    assert_eq!(result.status(), RunStatus::Success);
    assert_eq!(result.outcome("solo"), Some(&Outcome::Skipped));
    assert_eq!(healthy.calls(), vec!["create:bad", "create:child"]);

    let state = reconciler.state("production").await.unwrap();
    assert_eq!(state["bad"].status, RecordStatus::Active);
    assert_eq!(state["child"].status, RecordStatus::Active);
}
