//! Configuration for the in-memory relying-party store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default window during which a nonce is remembered (15 minutes).
///
/// Assertions carrying a nonce timestamp older than this are rejected
/// outright, so the store never needs to remember them.
pub const DEFAULT_MAX_NONCE_AGE: Duration = Duration::from_secs(15 * 60);

/// Default upper bound on associations kept per provider endpoint.
pub const DEFAULT_MAX_ASSOCIATIONS_PER_PROVIDER: usize = 16;

/// Default upper bound on simultaneously tracked nonces.
pub const DEFAULT_MAX_TRACKED_NONCES: u64 = 100_000;

/// Configuration for [`MemoryRelyingPartyStore`](crate::MemoryRelyingPartyStore).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use openid_rp_storage::MemoryStoreConfig;
///
/// let config = MemoryStoreConfig::builder()
///     .max_nonce_age(Duration::from_secs(300))
///     .build()?;
/// assert_eq!(config.max_nonce_age(), Duration::from_secs(300));
/// # Ok::<(), openid_rp_storage::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryStoreConfig {
    /// How long a nonce is remembered after its timestamp.
    #[serde(with = "humantime_serde", default = "default_max_nonce_age")]
    pub(crate) max_nonce_age: Duration,

    /// Associations kept per provider before the oldest is evicted.
    #[serde(default = "default_max_associations_per_provider")]
    pub(crate) max_associations_per_provider: usize,

    /// Capacity bound on the nonce ledger.
    ///
    /// Once reached, new nonces are refused (reported as not fresh) until
    /// tracked ones leave the retention window. Live nonces are never
    /// evicted to make room.
    #[serde(default = "default_max_tracked_nonces")]
    pub(crate) max_tracked_nonces: u64,
}

fn default_max_nonce_age() -> Duration {
    DEFAULT_MAX_NONCE_AGE
}

fn default_max_associations_per_provider() -> usize {
    DEFAULT_MAX_ASSOCIATIONS_PER_PROVIDER
}

fn default_max_tracked_nonces() -> u64 {
    DEFAULT_MAX_TRACKED_NONCES
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_nonce_age: DEFAULT_MAX_NONCE_AGE,
            max_associations_per_provider: DEFAULT_MAX_ASSOCIATIONS_PER_PROVIDER,
            max_tracked_nonces: DEFAULT_MAX_TRACKED_NONCES,
        }
    }
}

#[bon::bon]
impl MemoryStoreConfig {
    /// Creates a new configuration, validating every field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `max_nonce_age` is zero or
    /// either capacity is zero.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_MAX_NONCE_AGE)] max_nonce_age: Duration,
        #[builder(default = DEFAULT_MAX_ASSOCIATIONS_PER_PROVIDER)]
        max_associations_per_provider: usize,
        #[builder(default = DEFAULT_MAX_TRACKED_NONCES)] max_tracked_nonces: u64,
    ) -> Result<Self, ConfigError> {
        let config = Self { max_nonce_age, max_associations_per_provider, max_tracked_nonces };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants [`new`](Self::new) enforces.
    ///
    /// Deserialized configurations bypass the builder, so callers loading
    /// configuration from files should validate before use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] for a zero window or capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_nonce_age.is_zero() {
            return Err(ConfigError::BelowMinimum {
                field: "max_nonce_age",
                min: "1ms".into(),
                value: "0s".into(),
            });
        }
        if self.max_associations_per_provider == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_associations_per_provider",
                min: "1".into(),
                value: "0".into(),
            });
        }
        if self.max_tracked_nonces == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_tracked_nonces",
                min: "1".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// Returns the nonce retention window.
    #[must_use]
    pub fn max_nonce_age(&self) -> Duration {
        self.max_nonce_age
    }

    /// Returns the per-provider association bound.
    #[must_use]
    pub fn max_associations_per_provider(&self) -> usize {
        self.max_associations_per_provider
    }

    /// Returns the nonce ledger capacity.
    #[must_use]
    pub fn max_tracked_nonces(&self) -> u64 {
        self.max_tracked_nonces
    }
}
