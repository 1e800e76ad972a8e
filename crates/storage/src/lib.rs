//! Association and nonce storage for OpenID relying parties.
//!
//! This crate provides the [`RelyingPartyStore`] trait and related types that
//! a relying party uses to remember provider associations and to detect
//! replayed assertions. A store is shared by every relying-party instance in
//! a process, and across hosts when the implementation is backed by a
//! shared database.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Relying party (openid-rp)                  │
//! │     construction → purge_expired, response parsing → ...    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     openid-rp-storage                       │
//! │        AssociationStore + NonceStore = RelyingPartyStore    │
//! ├────────────────────────────┬────────────────────────────────┤
//! │  MemoryRelyingPartyStore   │     shared store (external)    │
//! │   (single process, tests)  │        (web farms)             │
//! └────────────────────────────┴────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//! use openid_rp_storage::{
//!     Association, AssociationKind, AssociationRequirements, AssociationStore,
//!     MemoryRelyingPartyStore, RelyingPartyStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryRelyingPartyStore::new();
//!     let provider = "https://op.example/server";
//!
//!     let association = Association::builder()
//!         .handle("h-1")
//!         .secret(vec![9u8; 32])
//!         .kind(AssociationKind::HmacSha256)
//!         .lifetime(Duration::from_secs(3600))
//!         .build();
//!     store.store_association(provider, association).await?;
//!
//!     let found = store.get_association(provider, AssociationRequirements::default()).await?;
//!     assert!(found.is_some());
//!
//!     store.purge_expired().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with shared test helpers (association builders,
//!   assertion macros).
//! - **`failpoints`**: Activates `fail` crate fail points for fault-injection tests.

#![deny(unsafe_code)]

pub mod association;
pub mod config;
pub mod error;
pub mod memory;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

// Re-export primary types at crate root for convenience
pub use association::{Association, AssociationKind, AssociationRequirements};
pub use config::{
    DEFAULT_MAX_ASSOCIATIONS_PER_PROVIDER, DEFAULT_MAX_NONCE_AGE, DEFAULT_MAX_TRACKED_NONCES,
    MemoryStoreConfig,
};
pub use error::{BoxError, ConfigError, StorageError, StorageResult};
pub use memory::MemoryRelyingPartyStore;
pub use store::{AssociationStore, NonceStore, PurgeReport, RelyingPartyStore};
pub use zeroize::Zeroizing;
