mod common;

use common::{MockProvider, graph_of};
use landform_engine::{EngineError, Outcome, ReconcileOptions, Reconciler, RunStatus};
use landform_graph::Resource;
use landform_state::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn test_worker_limit_bounds_inflight_calls() {
    let temp_dir = tempdir().unwrap();
    let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(25)));
    let reconciler = Reconciler::with_options(
        StateStore::new(temp_dir.path()),
        provider.clone(),
        ReconcileOptions { max_concurrency: 2 },
    )
    .unwrap();

    let graph = graph_of(
        (0..8)
            .map(|i| Resource::new(format!("res-{i}"), "network"))
            .collect(),
    );

    let result = reconciler.apply("production", &graph).await.unwrap();
    assert_eq!(result.status(), RunStatus::Success);
    assert_eq!(result.applied().len(), 8);
    assert!(
        provider.max_active() <= 2,
        "saw {} concurrent calls",
        provider.max_active()
    );
}

#[tokio::test]
async fn test_independent_branches_run_concurrently() {
    let temp_dir = tempdir().unwrap();
    let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(50)));
    let reconciler = Reconciler::with_options(
        StateStore::new(temp_dir.path()),
        provider.clone(),
        ReconcileOptions { max_concurrency: 4 },
    )
    .unwrap();

    let graph = graph_of(vec![
        Resource::new("left", "network"),
        Resource::new("right", "network"),
    ]);

    reconciler.apply("production", &graph).await.unwrap();
    assert!(provider.max_active() >= 2);
}

#[tokio::test]
async fn test_zero_concurrency_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let err = Reconciler::with_options(
        StateStore::new(temp_dir.path()),
        Arc::new(MockProvider::new()),
        ReconcileOptions { max_concurrency: 0 },
    )
    .err()
    .unwrap();
    assert!(matches!(err, EngineError::InvalidOptions(_)));
}

#[tokio::test]
async fn test_cancellation_stops_new_changes_but_finishes_inflight() {
    let temp_dir = tempdir().unwrap();
    let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(100)));
    let reconciler = Arc::new(Reconciler::new(
        StateStore::new(temp_dir.path()),
        provider.clone(),
    ));
    let token = reconciler.cancellation_token();

    let run = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move {
            let graph = graph_of(vec![
                Resource::new("net", "network"),
                Resource::new("app", "service").depends_on("net"),
            ]);
            reconciler.apply("production", &graph).await
        }
    });

    // cancel while the first change is still in flight
    tokio::time::sleep(Duration::from_millis(30)).await;
    token.cancel();

    let result = run.await.unwrap().unwrap();
    assert_eq!(result.status(), RunStatus::Cancelled);
    assert_eq!(result.outcome("net"), Some(&Outcome::Applied));
    assert_eq!(result.outcome("app"), Some(&Outcome::Cancelled));
    assert_eq!(provider.calls(), vec!["create:net"]);

    // the in-flight change still landed in state
    let state = reconciler.state("production").await.unwrap();
    assert!(state.contains_key("net"));
    assert!(!state.contains_key("app"));
}
