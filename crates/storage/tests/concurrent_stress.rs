//! Concurrent access stress tests for `MemoryRelyingPartyStore`.
//!
//! These tests exercise the store under multi-task workloads to detect
//! lost updates and double-accepted nonces. They are ignored by default
//! for CI runtime control:
//!
//! ```bash
//! cargo test -p openid-rp-storage --test concurrent_stress -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::panic)]

use std::collections::HashSet;

use chrono::Utc;
use openid_rp_storage::{
    AssociationKind, AssociationStore, MemoryRelyingPartyStore, MemoryStoreConfig, NonceStore,
    RelyingPartyStore,
    testutil::{make_association, make_handle},
};
use tokio::task::JoinSet;

/// Number of concurrent tasks for most tests.
const CONCURRENCY: usize = 16;

/// Number of nonce rounds for the exactly-one-winner test.
const NONCE_ROUNDS: usize = 50;

/// Number of operations each task performs in mixed workload tests.
const OPS_PER_TASK: usize = 100;

const OP: &str = "https://op.example/server";

// ---------------------------------------------------------------------------
// Test: Racing replays: exactly one caller accepts each nonce
// ---------------------------------------------------------------------------

/// In each round `CONCURRENCY` tasks race to record the same nonce. Exactly
/// one task must see it as fresh; all others must see a replay.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn nonce_exactly_one_winner_per_round() {
    let store = MemoryRelyingPartyStore::new();

    for round in 0..NONCE_ROUNDS {
        let nonce = format!("nonce-{round}");
        let timestamp = Utc::now();

        let mut set = JoinSet::new();
        for _ in 0..CONCURRENCY {
            let store = store.clone();
            let nonce = nonce.clone();
            set.spawn(async move { store.store_nonce(OP, &nonce, timestamp).await });
        }

        let mut fresh = 0usize;
        let mut replays = 0usize;
        while let Some(result) = set.join_next().await {
            match result.expect("task should not panic") {
                Ok(true) => fresh += 1,
                Ok(false) => replays += 1,
                Err(e) => panic!("unexpected error in round {round}: {e}"),
            }
        }

        assert_eq!(fresh, 1, "round {round}: exactly one caller should accept the nonce");
        assert_eq!(replays, CONCURRENCY - 1, "round {round}: all others should see a replay");
    }
}

// ---------------------------------------------------------------------------
// Test: Parallel association writers on distinct handles
// ---------------------------------------------------------------------------

/// Each task stores its own handles. No write may be lost.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn parallel_association_writers_lose_nothing() {
    let config = MemoryStoreConfig::builder()
        .max_associations_per_provider(CONCURRENCY * OPS_PER_TASK)
        .build()
        .expect("valid config");
    let store = MemoryRelyingPartyStore::with_config(config);

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY {
        let store = store.clone();
        set.spawn(async move {
            for i in 0..OPS_PER_TASK {
                let handle = make_handle(&format!("task{task_id}"), i);
                store
                    .store_association(OP, make_association(&handle, AssociationKind::HmacSha256))
                    .await
                    .expect("store should succeed");
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    assert_eq!(store.association_count(), CONCURRENCY * OPS_PER_TASK);
}

// ---------------------------------------------------------------------------
// Test: Purges interleaved with writers
// ---------------------------------------------------------------------------

/// Housekeeping running concurrently with nonce writers must not drop
/// live nonces: every nonce recorded is still recognized as a replay.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn purge_concurrent_with_writers_keeps_live_nonces() {
    let store = MemoryRelyingPartyStore::new();
    let timestamp = Utc::now();

    let mut set = JoinSet::new();
    for task_id in 0..CONCURRENCY {
        let store = store.clone();
        set.spawn(async move {
            let mut recorded = HashSet::new();
            for i in 0..OPS_PER_TASK {
                let nonce = format!("t{task_id}-n{i}");
                if store.store_nonce(OP, &nonce, timestamp).await.expect("store_nonce") {
                    recorded.insert(nonce);
                }
                if i % 10 == 0 {
                    store.purge_expired().await.expect("purge");
                }
            }
            recorded
        });
    }

    let mut all = HashSet::new();
    while let Some(result) = set.join_next().await {
        all.extend(result.expect("task should not panic"));
    }
    assert_eq!(all.len(), CONCURRENCY * OPS_PER_TASK);

    for nonce in &all {
        assert!(
            !store.store_nonce(OP, nonce, timestamp).await.expect("store_nonce"),
            "{nonce} should still be remembered"
        );
    }
}
