//! Shared test utilities for store testing.
//!
//! This module provides helpers for building associations and asserting on
//! [`StorageResult`] values. It is feature-gated behind `testutil` to
//! prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! openid-rp-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use openid_rp_storage::testutil::{make_association, make_handle};
//! ```

use std::time::Duration;

use chrono::{TimeDelta, Utc};

use crate::association::{Association, AssociationKind};

/// Lifetime used by [`make_association`] (two weeks, a typical provider default).
pub const TEST_ASSOCIATION_LIFETIME: Duration = Duration::from_secs(14 * 24 * 3600);

/// Create a deterministic association handle from a prefix and index.
///
/// Produces handles like `"prefix-000042"`.
#[must_use]
pub fn make_handle(prefix: &str, idx: usize) -> String {
    format!("{prefix}-{idx:06}")
}

/// Create a fresh association of the given kind with a secret of matching length.
#[must_use]
pub fn make_association(handle: &str, kind: AssociationKind) -> Association {
    let secret_len = usize::try_from(kind.secret_bits() / 8).unwrap_or(32);
    Association::builder()
        .handle(handle)
        .secret(vec![0xAB; secret_len])
        .kind(kind)
        .lifetime(TEST_ASSOCIATION_LIFETIME)
        .build()
}

/// Create an association that expired `ago` in the past.
#[must_use]
pub fn make_expired_association(handle: &str, ago: TimeDelta) -> Association {
    let mut association = make_association(handle, AssociationKind::HmacSha256);
    association.lifetime = Duration::from_secs(60);
    association.issued_at = Utc::now() - TimeDelta::seconds(60) - ago;
    association
}

/// Asserts that a [`StorageResult`] is an `Err` matching the given [`StorageError`] variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use openid_rp_storage::assert_storage_error;
/// use openid_rp_storage::StorageError;
///
/// let result: Result<(), StorageError> = Err(StorageError::connection("refused"));
/// assert_storage_error!(result, Connection);
/// ```
#[macro_export]
macro_rules! assert_storage_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::StorageError::$variant { .. })),
            "expected StorageError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::StorageError::$variant { .. })),
            "{}: expected StorageError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
