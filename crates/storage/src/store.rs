//! Storage traits for relying-party associations and nonces.
//!
//! A relying party deployed on several hosts shares one store so that an
//! association negotiated on one host can verify an assertion arriving at
//! another, and so that a replayed assertion is caught no matter which
//! host it reaches.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐       ┌──────────────────────┐       ┌─────────────┐
//! │   Host A    │       │  RelyingPartyStore   │       │   Host B    │
//! │ (relying    │──────►│ associations (by     │◄──────│ (relying    │
//! │   party)    │       │ provider + handle),  │       │   party)    │
//! │             │       │ nonces (by context)  │       │             │
//! └─────────────┘       └──────────────────────┘       └─────────────┘
//! ```
//!
//! # Storage Traits
//!
//! - [`AssociationStore`]: shared secrets keyed by provider endpoint and handle
//! - [`NonceStore`]: replay ledger keyed by `(context, nonce, timestamp)`
//! - [`RelyingPartyStore`]: both, plus coarse housekeeping
//!
//! Use [`MemoryRelyingPartyStore`](crate::MemoryRelyingPartyStore) for a
//! single-process deployment or for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    association::{Association, AssociationRequirements},
    error::StorageResult,
};

/// Persistence for associations negotiated with providers.
///
/// Every method takes a `provider` argument (the provider endpoint URL) as
/// the distinguishing factor: handles are only unique per provider.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Stores an association for `provider`.
    ///
    /// Storing an association whose handle already exists for `provider`
    /// replaces it.
    async fn store_association(
        &self,
        provider: &str,
        association: Association,
    ) -> StorageResult<()>;

    /// Returns the most recently issued, unexpired association for
    /// `provider` that satisfies `requirements`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(association))` if a usable association exists
    /// - `Ok(None)` if none qualifies
    /// - `Err(...)` on storage errors
    async fn get_association(
        &self,
        provider: &str,
        requirements: AssociationRequirements,
    ) -> StorageResult<Option<Association>>;

    /// Returns the association with `handle` for `provider`.
    ///
    /// Expired associations are treated as absent.
    async fn get_association_by_handle(
        &self,
        provider: &str,
        handle: &str,
    ) -> StorageResult<Option<Association>>;

    /// Removes the association with `handle` for `provider`.
    ///
    /// Returns `true` if an association was removed.
    async fn remove_association(&self, provider: &str, handle: &str) -> StorageResult<bool>;
}

/// Replay ledger for nonces carried by positive assertions.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Records a nonce, reporting whether it was fresh.
    ///
    /// `context` scopes the nonce (usually the provider endpoint, or the
    /// association handle for relying-party generated nonces). `timestamp`
    /// is the time embedded in the nonce.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the nonce was not seen before and is within the retention window
    /// - `Ok(false)` if the nonce was already recorded, or its timestamp is too old for the store
    ///   to vouch for it
    ///
    /// Implementations must be atomic: when several callers race to record
    /// the same nonce, exactly one of them observes `true`.
    async fn store_nonce(
        &self,
        context: &str,
        nonce: &str,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<bool>;
}

/// Counts reported by [`RelyingPartyStore::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Expired associations removed.
    pub associations: usize,
    /// Nonces removed because they fell out of the retention window.
    pub nonces: u64,
}

impl PurgeReport {
    /// Total number of entries removed.
    #[must_use]
    pub fn total(&self) -> u64 {
        u64::try_from(self.associations).unwrap_or(u64::MAX).saturating_add(self.nonces)
    }
}

/// The store a relying party shares across instances and hosts.
///
/// Relying parties call [`purge_expired`](Self::purge_expired) each time an
/// instance is created, amortizing housekeeping across requests instead of
/// running a background task.
#[async_trait]
pub trait RelyingPartyStore: AssociationStore + NonceStore {
    /// Removes expired associations and nonces older than the retention window.
    async fn purge_expired(&self) -> StorageResult<PurgeReport>;
}
