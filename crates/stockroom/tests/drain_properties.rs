//! Property tests for drain passes driven through the test harness.

use proptest::prelude::*;

use stockroom::core::NewOperation;
use stockroom_testkit::generators::known_operation;
use stockroom_testkit::TestHarness;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Each case: an operation plus how many times its endpoint fails before
/// succeeding.
fn workload() -> impl Strategy<Value = Vec<(NewOperation, usize)>> {
    prop::collection::vec((known_operation(), 0usize..6), 1..12).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (mut op, failures))| {
                // Unique endpoints so scripts address a single record.
                op.endpoint = format!("/api/items/{}", i);
                (op, failures)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn drain_matches_retry_model(items in workload(), passes in 1usize..6) {
        let rt = runtime();
        let harness = TestHarness::new();

        let ids = rt.block_on(async {
            let mut ids = Vec::new();
            for (op, failures) in &items {
                harness.executor.fail_times(&op.endpoint, 500, *failures);
                ids.push(harness.manager.queue_operation(op.clone()).await.unwrap());
            }
            for _ in 0..passes {
                harness.manager.sync().await;
            }
            ids
        });

        let remaining = rt.block_on(harness.manager.operations()).unwrap();
        let calls = harness.executor.call_ids();

        // Remaining records keep their relative enqueue order.
        let positions: Vec<usize> = remaining
            .iter()
            .map(|op| ids.iter().position(|id| *id == op.id).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));

        for (i, (_, failures)) in items.iter().enumerate() {
            let attempts = calls.iter().filter(|id| **id == ids[i]).count();
            prop_assert_eq!(attempts, passes.min(failures + 1).min(3));

            let synced = *failures < 3 && passes > *failures;
            let record = remaining.iter().find(|op| op.id == ids[i]);
            if synced {
                prop_assert!(record.is_none());
            } else {
                let record = record.unwrap();
                prop_assert_eq!(record.retry_count as usize, passes.min(3));
                prop_assert_eq!(record.is_failed(), passes >= 3);
            }
        }
    }

    #[test]
    fn offline_enqueue_keeps_fifo_and_unique_ids(ops in prop::collection::vec(known_operation(), 0..20)) {
        let rt = runtime();
        let harness = TestHarness::offline();

        let ids = rt.block_on(async {
            let mut ids = Vec::new();
            for op in &ops {
                ids.push(harness.manager.queue_operation(op.clone()).await.unwrap());
            }
            ids
        });

        let listed: Vec<_> = rt
            .block_on(harness.manager.operations())
            .unwrap()
            .into_iter()
            .map(|op| op.id)
            .collect();
        prop_assert_eq!(&listed, &ids);

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), ids.len());
        prop_assert_eq!(harness.executor.call_count(), 0);
    }
}
