//! Two managers in one test standing in for two processes sharing a queue
//! file.

use std::sync::Arc;
use std::time::Duration;

use stockroom::core::{NewOperation, OperationType};
use stockroom::store::SqliteQueueStore;
use stockroom::sync::{Connectivity, LeaseConfig, ManualConnectivity, SyncConfig, SyncManager};
use stockroom::SyncOutcome;
use stockroom_testkit::ScriptedExecutor;

type SharedManager = SyncManager<SqliteQueueStore, Arc<ScriptedExecutor>>;

fn manager(path: &std::path::Path, holder: &str, executor: Arc<ScriptedExecutor>) -> Arc<SharedManager> {
    let connectivity: Arc<dyn Connectivity> = Arc::new(ManualConnectivity::online());
    let config = SyncConfig {
        sync_on_enqueue: false,
        lease: Some(LeaseConfig {
            name: "drain".into(),
            holder: holder.into(),
            ttl: Duration::from_secs(60),
        }),
        ..Default::default()
    };
    Arc::new(SyncManager::new(
        SqliteQueueStore::open(path).unwrap(),
        executor,
        connectivity,
        config,
    ))
}

#[tokio::test]
async fn test_lease_keeps_second_process_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    let exec_a = Arc::new(ScriptedExecutor::new());
    let exec_b = Arc::new(ScriptedExecutor::new());
    let a = manager(&path, "process-a", Arc::clone(&exec_a));
    let b = manager(&path, "process-b", Arc::clone(&exec_b));

    a.queue_operation(NewOperation::new(OperationType::Delete, "/api/products/1"))
        .await
        .unwrap();
    b.queue_operation(NewOperation::new(OperationType::Delete, "/api/products/2"))
        .await
        .unwrap();
    assert_eq!(a.pending_count().await.unwrap(), 2);

    exec_a.pause();
    let drain = {
        let a = Arc::clone(&a);
        tokio::spawn(async move { a.sync().await })
    };
    exec_a.wait_for_held_call().await;

    assert_eq!(b.sync().await, SyncOutcome::LeaseHeld);
    assert_eq!(exec_b.call_count(), 0);

    exec_a.resume();
    let outcome = drain.await.unwrap();
    assert_eq!(outcome.report().unwrap().synced, 2);

    // Lease released: the other process can drain (nothing left).
    let outcome = b.sync().await;
    assert_eq!(outcome.report().unwrap().synced, 0);
    assert_eq!(b.pending_count().await.unwrap(), 0);
}
