//! Queue behaviour tests: ordering, quarantine, failure isolation, enqueue,
//! single active pass, clearing, and replay fidelity.

use std::sync::Arc;

use serde_json::json;

use stockroom::core::{NewOperation, OperationType, SyncEvent};
use stockroom::sync::SyncConfig;
use stockroom::SyncOutcome;
use stockroom_testkit::{Reply, TestHarness};

fn create(endpoint: &str, n: u32) -> NewOperation {
    NewOperation::new(OperationType::Create, endpoint).data(json!({"name": "item", "n": n}))
}

#[tokio::test]
async fn test_offline_operations_replay_in_enqueue_order() {
    let harness = TestHarness::offline();
    let a = harness.manager.queue_operation(create("/api/a", 1)).await.unwrap();
    let b = harness.manager.queue_operation(create("/api/b", 2)).await.unwrap();
    let c = harness.manager.queue_operation(create("/api/c", 3)).await.unwrap();

    harness.connectivity.set_online(true);
    let outcome = harness.manager.sync().await;

    assert_eq!(outcome.report().unwrap().synced, 3);
    assert_eq!(harness.executor.call_ids(), vec![a, b, c]);
    assert!(harness.manager.operations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quarantine_after_three_failed_passes() {
    let harness = TestHarness::new();
    harness.executor.always("/api/bad", Reply::Status(500));
    let id = harness.manager.queue_operation(create("/api/bad", 1)).await.unwrap();

    for pass in 1..=3 {
        harness.manager.sync().await;
        let op = harness.manager.operations().await.unwrap().remove(0);
        assert_eq!(op.retry_count, pass);
        assert_eq!(op.is_failed(), pass == 3);
    }

    // Further passes leave the quarantined record alone.
    harness.manager.sync().await;
    harness.manager.sync().await;
    assert_eq!(harness.executor.call_count(), 3);
    assert_eq!(harness.manager.pending_count().await.unwrap(), 0);
    assert_eq!(harness.manager.failed_operations().await.unwrap()[0].id, id);

    let failed_events: Vec<_> = harness
        .events()
        .into_iter()
        .filter(|e| matches!(e, SyncEvent::OperationFailed { .. }))
        .collect();
    assert_eq!(
        failed_events,
        vec![SyncEvent::OperationFailed {
            id,
            error: "HTTP 500: ".into()
        }]
    );
}

#[tokio::test]
async fn test_failure_of_middle_record_does_not_affect_neighbours() {
    let harness = TestHarness::new();
    harness.executor.fail_times("/api/b", 503, 1);
    harness.manager.queue_operation(create("/api/a", 1)).await.unwrap();
    let b = harness.manager.queue_operation(create("/api/b", 2)).await.unwrap();
    harness.manager.queue_operation(create("/api/c", 3)).await.unwrap();

    let report = harness.manager.sync().await.report().cloned().unwrap();
    assert_eq!((report.synced, report.failed, report.quarantined), (2, 1, 0));

    let remaining = harness.manager.operations().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, b);
    assert_eq!(remaining[0].retry_count, 1);
    assert!(remaining[0].is_pending());

    assert_eq!(
        harness.event_names(),
        vec![
            "operation_queued",
            "operation_queued",
            "operation_queued",
            "sync_started",
            "operation_synced",
            "operation_synced",
            "sync_completed",
        ]
    );
}

#[tokio::test]
async fn test_offline_enqueue_persists_distinct_records_without_draining() {
    let harness = TestHarness::with_config(SyncConfig::default(), false);
    let op = create("/api/same", 7);

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(harness.manager.queue_operation(op.clone()).await.unwrap());
    }
    tokio::task::yield_now().await;

    let stored = harness.manager.operations().await.unwrap();
    assert_eq!(stored.len(), 5);
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5);
    assert_eq!(harness.executor.call_count(), 0);
    assert!(!harness.event_names().contains(&"sync_started"));
}

#[tokio::test]
async fn test_enqueue_while_online_drains_in_background() {
    let harness = TestHarness::with_config(SyncConfig::default(), true);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _sub = harness.manager.subscribe(move |event| {
        if let SyncEvent::SyncCompleted { synced, .. } = event {
            let _ = tx.send(*synced);
        }
    });

    harness.manager.queue_operation(create("/api/a", 1)).await.unwrap();

    assert_eq!(rx.recv().await, Some(1));
    assert_eq!(harness.manager.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_second_sync_during_pass_is_noop() {
    let harness = TestHarness::new();
    harness.manager.queue_operation(create("/api/a", 1)).await.unwrap();
    harness.manager.queue_operation(create("/api/b", 2)).await.unwrap();

    harness.executor.pause();
    let manager = Arc::clone(&harness.manager);
    let first = tokio::spawn(async move { manager.sync().await });

    harness.executor.wait_for_held_call().await;
    assert!(harness.manager.is_syncing());
    assert_eq!(harness.manager.sync().await, SyncOutcome::AlreadyRunning);
    assert!(*harness.manager.status().borrow() == stockroom::SyncStatus {
        pending_count: 2,
        failed_count: 0,
        is_syncing: true,
    });

    harness.executor.resume();
    let outcome = first.await.unwrap();

    assert_eq!(outcome.report().unwrap().synced, 2);
    assert_eq!(harness.executor.call_count(), 2);
    assert!(!harness.manager.is_syncing());
    assert_eq!(
        harness
            .event_names()
            .iter()
            .filter(|n| **n == "sync_started")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_clear_failed_leaves_pending_records() {
    let config = SyncConfig {
        sync_on_enqueue: false,
        quarantine_client_errors: true,
        ..Default::default()
    };
    let harness = TestHarness::with_config(config, true);
    for n in 0..3 {
        let endpoint = format!("/api/rejected/{}", n);
        harness.executor.always(&endpoint, Reply::Status(422));
        harness.manager.queue_operation(create(&endpoint, n)).await.unwrap();
    }
    harness.manager.sync().await;
    assert_eq!(harness.manager.failed_count().await.unwrap(), 3);

    harness.connectivity.set_online(false);
    let p1 = harness.manager.queue_operation(create("/api/p1", 1)).await.unwrap();
    let p2 = harness.manager.queue_operation(create("/api/p2", 2)).await.unwrap();

    assert_eq!(harness.manager.clear_failed_operations().await.unwrap(), 3);

    let remaining: Vec<_> = harness
        .manager
        .operations()
        .await
        .unwrap()
        .into_iter()
        .map(|op| op.id)
        .collect();
    assert_eq!(remaining, vec![p1, p2]);
    assert_eq!(harness.manager.pending_count().await.unwrap(), 2);
    assert_eq!(
        harness.events().last(),
        Some(&SyncEvent::FailedCleared { count: 3 })
    );
}

#[tokio::test]
async fn test_successful_replay_sends_original_payload_once() {
    let harness = TestHarness::new();
    harness.executor.fail_times("/api/laundry/4/collect", 503, 2);

    let submitted = NewOperation::new(OperationType::Collect, "/api/laundry/4/collect")
        .data(json!({"bags": 3, "room": "204"}))
        .hotel_id("h-17");
    let id = harness.manager.queue_operation(submitted.clone()).await.unwrap();

    for _ in 0..3 {
        harness.manager.sync().await;
    }

    assert!(harness.manager.operations().await.unwrap().is_empty());

    let calls = harness.executor.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|op| op.id == id));
    let last = calls.last().unwrap();
    assert_eq!(last.op_type, submitted.op_type);
    assert_eq!(last.endpoint, submitted.endpoint);
    assert_eq!(last.data, submitted.data);
    assert_eq!(last.hotel_id, submitted.hotel_id);
    assert_eq!(last.retry_count, 2);

    let synced: Vec<_> = harness
        .events()
        .into_iter()
        .filter(|e| matches!(e, SyncEvent::OperationSynced { .. }))
        .collect();
    assert_eq!(synced, vec![SyncEvent::OperationSynced { id }]);
}

#[tokio::test]
async fn test_unknown_type_is_accepted_then_quarantined() {
    let harness = TestHarness::new();
    let id = harness
        .manager
        .queue_operation(NewOperation::new(OperationType::from("TRANSFER"), "/api/stock/1"))
        .await
        .unwrap();

    for _ in 0..3 {
        harness.manager.sync().await;
    }

    let failed = harness.manager.failed_operations().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, id);
    assert_eq!(
        failed[0].last_error.as_deref(),
        Some("unknown operation type: TRANSFER")
    );
}

#[tokio::test]
async fn test_store_read_failure_aborts_pass() {
    let harness = TestHarness::new();
    harness.manager.queue_operation(create("/api/a", 1)).await.unwrap();
    harness.clear_events();

    harness.store.fail_reads(true);
    let outcome = harness.manager.sync().await;
    harness.store.fail_reads(false);

    assert!(matches!(outcome, SyncOutcome::Aborted(_)));
    assert!(!harness.manager.is_syncing());
    assert_eq!(harness.executor.call_count(), 0);
    assert_eq!(harness.event_names(), vec!["sync_started", "sync_error"]);

    // The next pass works normally.
    assert_eq!(harness.manager.sync().await.report().unwrap().synced, 1);
}

#[tokio::test]
async fn test_store_write_failure_keeps_record_queued() {
    let harness = TestHarness::new();
    let id = harness.manager.queue_operation(create("/api/a", 1)).await.unwrap();

    harness.store.fail_writes(true);
    let outcome = harness.manager.sync().await;
    harness.store.fail_writes(false);

    assert!(matches!(outcome, SyncOutcome::Aborted(_)));
    // The request went out but the removal did not, so it is replayed again.
    assert_eq!(harness.manager.operations().await.unwrap()[0].id, id);
    assert_eq!(harness.manager.sync().await.report().unwrap().synced, 1);
    assert_eq!(harness.executor.call_ids(), vec![id.clone(), id]);
}

#[tokio::test]
async fn test_enqueue_store_failure_is_reported() {
    let harness = TestHarness::new();
    harness.store.fail_writes(true);

    let result = harness.manager.queue_operation(create("/api/a", 1)).await;
    assert!(matches!(result, Err(stockroom::sync::SyncError::Store(_))));
    assert!(harness.events().is_empty());
}

#[tokio::test]
async fn test_panicking_listener_does_not_stop_pass() {
    let harness = TestHarness::new();
    let _bad = harness.manager.subscribe(|event| {
        if matches!(event, SyncEvent::OperationSynced { .. }) {
            panic!("listener failure");
        }
    });
    harness.manager.queue_operation(create("/api/a", 1)).await.unwrap();
    harness.manager.queue_operation(create("/api/b", 2)).await.unwrap();

    let outcome = harness.manager.sync().await;
    assert_eq!(outcome.report().unwrap().synced, 2);
    assert_eq!(harness.event_names().last(), Some(&"sync_completed"));
}

#[tokio::test]
async fn test_quota_rejects_new_records() {
    let store = stockroom_testkit::FlakyStore::with_limits(stockroom::QueueLimits::new(2, usize::MAX));
    let config = SyncConfig {
        sync_on_enqueue: false,
        ..Default::default()
    };
    let harness = TestHarness::with_store(store, config, false);

    harness.manager.queue_operation(create("/api/a", 1)).await.unwrap();
    harness.manager.queue_operation(create("/api/b", 2)).await.unwrap();
    let err = harness
        .manager
        .queue_operation(create("/api/c", 3))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        stockroom::sync::SyncError::Store(stockroom::store::StoreError::QuotaExceeded { .. })
    ));
    assert_eq!(harness.manager.operations().await.unwrap().len(), 2);
}
