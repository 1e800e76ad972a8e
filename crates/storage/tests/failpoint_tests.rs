#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection.
//!
//! These tests require the `failpoints` feature:
//! ```bash
//! cargo test -p openid-rp-storage --features failpoints --test failpoint_tests
//! ```

use openid_rp_storage::{MemoryRelyingPartyStore, RelyingPartyStore, assert_storage_error};

#[tokio::test]
async fn purge_failpoint_returns_error() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("store-before-purge", "return").expect("failed to configure fail point");

    let store = MemoryRelyingPartyStore::new();
    let result = store.purge_expired().await;
    assert_storage_error!(result, Internal, "purge should fail when fail point is active");

    scenario.teardown();
}

#[tokio::test]
async fn purge_without_failpoint_succeeds() {
    let scenario = fail::FailScenario::setup();

    let store = MemoryRelyingPartyStore::new();
    let result = store.purge_expired().await;
    assert!(result.is_ok(), "purge should succeed without fail point");

    scenario.teardown();
}
