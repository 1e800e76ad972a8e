//! In-memory relying-party store.
//!
//! This module provides [`MemoryRelyingPartyStore`], the default store a
//! relying party creates when the hosting application does not supply one.
//!
//! # Features
//!
//! - **Thread-safe**: associations sit behind a [`parking_lot::RwLock`]
//! - **Per-entry nonce expiry**: the nonce ledger is a [`moka::future::Cache`] whose entries
//!   expire when their timestamp leaves the retention window
//! - **Capacity-bounded**: per-provider association limit; a full nonce ledger refuses new
//!   nonces rather than forgetting live ones
//! - **No background task**: expired entries are dropped by [`purge_expired`]
//!
//! # Limitations
//!
//! - Data is not persisted; all associations are lost when the process exits
//! - Not shared across hosts; a web farm needs a shared store implementation
//!
//! [`purge_expired`]: crate::RelyingPartyStore::purge_expired

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use fail::fail_point;
use moka::future::Cache;
use parking_lot::RwLock;

use crate::{
    association::{Association, AssociationRequirements},
    config::MemoryStoreConfig,
    error::StorageResult,
    store::{AssociationStore, NonceStore, PurgeReport, RelyingPartyStore},
};

/// Per-entry expiry policy: each nonce carries its remaining lifetime.
struct NonceExpiry;

impl moka::Expiry<String, Duration> for NonceExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Duration,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(*value)
    }
}

/// In-memory implementation of [`RelyingPartyStore`].
///
/// # Cloning
///
/// `MemoryRelyingPartyStore` is cheaply cloneable. All clones share the same
/// associations and nonce ledger.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use openid_rp_storage::{MemoryRelyingPartyStore, NonceStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRelyingPartyStore::new();
///     let now = Utc::now();
///
///     assert!(store.store_nonce("https://op.example/", "abc", now).await?);
///     assert!(!store.store_nonce("https://op.example/", "abc", now).await?);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MemoryRelyingPartyStore {
    /// Associations indexed by provider endpoint.
    associations: Arc<RwLock<HashMap<String, Vec<Association>>>>,
    /// Nonce ledger mapping `context\0timestamp\0nonce` to its remaining lifetime.
    nonces: Cache<String, Duration>,
    config: MemoryStoreConfig,
}

impl MemoryRelyingPartyStore {
    /// Creates a store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    /// Creates a store with the given configuration.
    #[must_use]
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        // No size-based eviction: a live nonce must never be forgotten, so
        // the capacity bound is enforced in `store_nonce` by refusal.
        let nonces = Cache::builder().expire_after(NonceExpiry).build();
        Self { associations: Arc::new(RwLock::new(HashMap::new())), nonces, config }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }

    /// Number of associations currently held, expired ones included.
    #[must_use]
    pub fn association_count(&self) -> usize {
        self.associations.read().values().map(Vec::len).sum()
    }

    /// Number of nonces currently tracked.
    ///
    /// Runs pending cache maintenance first so the count reflects expirations.
    pub async fn tracked_nonces(&self) -> u64 {
        self.nonces.run_pending_tasks().await;
        self.nonces.entry_count()
    }

    /// Returns `true` if the ledger holds `max_tracked_nonces` entries.
    ///
    /// The cache count lags behind recent writes, so a full reading is
    /// settled before it is trusted. Concurrent inserts may overshoot the
    /// bound slightly; nothing is ever evicted to make room.
    async fn ledger_full(&self) -> bool {
        let capacity = self.config.max_tracked_nonces();
        if self.nonces.entry_count() < capacity {
            return false;
        }
        self.nonces.run_pending_tasks().await;
        self.nonces.entry_count() >= capacity
    }

    fn nonce_key(context: &str, nonce: &str, timestamp: DateTime<Utc>) -> String {
        format!("{context}\0{}\0{nonce}", timestamp.timestamp_millis())
    }

    /// Returns how much longer a nonce stamped at `timestamp` must be
    /// remembered, or `None` if it is already outside the retention window.
    fn remaining_window(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        let max_age = TimeDelta::from_std(self.config.max_nonce_age()).unwrap_or(TimeDelta::MAX);
        let age = now.signed_duration_since(timestamp);
        if age > max_age {
            return None;
        }
        // Timestamps from the future (clock skew) are kept for the full window
        // measured from their own timestamp.
        Some(
            max_age
                .checked_sub(&age)
                .and_then(|remaining| remaining.to_std().ok())
                .unwrap_or(self.config.max_nonce_age()),
        )
    }
}

impl Default for MemoryRelyingPartyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssociationStore for MemoryRelyingPartyStore {
    #[tracing::instrument(skip(self, association), fields(handle = %association.handle))]
    async fn store_association(
        &self,
        provider: &str,
        association: Association,
    ) -> StorageResult<()> {
        let mut associations = self.associations.write();
        let entries = associations.entry(provider.to_owned()).or_default();

        entries.retain(|existing| existing.handle != association.handle);
        entries.push(association);

        if entries.len() > self.config.max_associations_per_provider() {
            if let Some(oldest) = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, a)| a.issued_at)
                .map(|(idx, _)| idx)
            {
                let evicted = entries.remove(oldest);
                tracing::debug!(evicted = %evicted.handle, "association capacity reached");
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_association(
        &self,
        provider: &str,
        requirements: AssociationRequirements,
    ) -> StorageResult<Option<Association>> {
        let now = Utc::now();
        let associations = self.associations.read();
        Ok(associations.get(provider).and_then(|entries| {
            entries
                .iter()
                .filter(|a| !a.is_expired_at(now) && requirements.allows(a))
                .max_by_key(|a| a.issued_at)
                .cloned()
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn get_association_by_handle(
        &self,
        provider: &str,
        handle: &str,
    ) -> StorageResult<Option<Association>> {
        let now = Utc::now();
        let associations = self.associations.read();
        Ok(associations.get(provider).and_then(|entries| {
            entries.iter().find(|a| a.handle == handle && !a.is_expired_at(now)).cloned()
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn remove_association(&self, provider: &str, handle: &str) -> StorageResult<bool> {
        let mut associations = self.associations.write();
        let Some(entries) = associations.get_mut(provider) else {
            return Ok(false);
        };

        let before = entries.len();
        entries.retain(|a| a.handle != handle);
        let removed = entries.len() != before;

        if entries.is_empty() {
            associations.remove(provider);
        }
        Ok(removed)
    }
}

#[async_trait]
impl NonceStore for MemoryRelyingPartyStore {
    #[tracing::instrument(skip(self))]
    async fn store_nonce(
        &self,
        context: &str,
        nonce: &str,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let Some(remaining) = self.remaining_window(timestamp, Utc::now()) else {
            tracing::debug!("nonce timestamp outside retention window");
            return Ok(false);
        };

        if self.ledger_full().await {
            tracing::warn!(
                capacity = self.config.max_tracked_nonces(),
                "nonce ledger full; refusing nonce"
            );
            return Ok(false);
        }

        // `or_insert` is atomic per key: concurrent callers for the same
        // nonce see exactly one fresh entry.
        let entry =
            self.nonces.entry(Self::nonce_key(context, nonce, timestamp)).or_insert(remaining).await;

        if !entry.is_fresh() {
            tracing::debug!("nonce replayed");
        }
        Ok(entry.is_fresh())
    }
}

#[async_trait]
impl RelyingPartyStore for MemoryRelyingPartyStore {
    #[tracing::instrument(skip(self))]
    async fn purge_expired(&self) -> StorageResult<PurgeReport> {
        fail_point!("store-before-purge", |_| {
            Err(crate::error::StorageError::internal("injected failure before purge"))
        });

        let now = Utc::now();
        let associations = {
            let mut map = self.associations.write();
            let mut removed = 0usize;
            map.retain(|_, entries| {
                let before = entries.len();
                entries.retain(|a| !a.is_expired_at(now));
                removed += before - entries.len();
                !entries.is_empty()
            });
            removed
        };

        // Counts are approximate: the cache applies inserts and expirations
        // lazily, and `run_pending_tasks` settles both.
        let tracked_before = self.nonces.entry_count();
        self.nonces.run_pending_tasks().await;
        let nonces = tracked_before.saturating_sub(self.nonces.entry_count());

        let report = PurgeReport { associations, nonces };
        tracing::debug!(associations = report.associations, nonces = report.nonces, "purged store");
        Ok(report)
    }
}
