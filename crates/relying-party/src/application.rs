//! Application-wide shared state.
//!
//! A hosting application owns one [`ApplicationState`] for its lifetime and
//! hands it to relying-party code that needs process-wide values, most
//! importantly the default association and nonce store. Values are created
//! lazily on first use; creation is serialized so that concurrent first
//! requests observe a single instance.

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use openid_rp_storage::RelyingPartyStore;
use parking_lot::{Mutex, RwLock};

use crate::error::{RelyingPartyError, Result};

/// Key under which the default store is published.
pub const APPLICATION_STORE_KEY: &str = "openid_rp.application_store";

/// A type-erased shared value.
pub type SharedValue = Arc<dyn Any + Send + Sync>;

/// Wrapper giving the store trait object a concrete type to downcast to.
struct PublishedStore(Arc<dyn RelyingPartyStore>);

/// Keyed, process-wide values shared by every request an application serves.
#[derive(Default)]
pub struct ApplicationState {
    values: RwLock<HashMap<String, SharedValue>>,
    init_lock: Mutex<()>,
}

impl ApplicationState {
    /// Creates empty application state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value published under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SharedValue> {
        self.values.read().get(key).cloned()
    }

    /// Publishes `value` under `key`, returning the value it replaced.
    pub fn insert(&self, key: impl Into<String>, value: SharedValue) -> Option<SharedValue> {
        self.values.write().insert(key.into(), value)
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&self, key: &str) -> Option<SharedValue> {
        self.values.write().remove(key)
    }

    /// Returns the published store, creating it with `factory` if absent.
    ///
    /// The fast path takes only a read lock. On a miss, creation runs under
    /// the init lock and the map is checked again, so `factory` runs at most
    /// once per state no matter how many callers race.
    ///
    /// # Errors
    ///
    /// Returns [`RelyingPartyError::Configuration`] if a value of another type
    /// is already published under [`APPLICATION_STORE_KEY`].
    pub fn store_or_init<F>(&self, factory: F) -> Result<Arc<dyn RelyingPartyStore>>
    where
        F: FnOnce() -> Arc<dyn RelyingPartyStore>,
    {
        if let Some(store) = self.published_store()? {
            return Ok(store);
        }

        let _guard = self.init_lock.lock();
        if let Some(store) = self.published_store()? {
            return Ok(store);
        }

        let store = factory();
        self.insert(APPLICATION_STORE_KEY, Arc::new(PublishedStore(Arc::clone(&store))));
        tracing::info!(key = APPLICATION_STORE_KEY, "Created application-wide relying party store");
        Ok(store)
    }

    fn published_store(&self) -> Result<Option<Arc<dyn RelyingPartyStore>>> {
        let Some(value) = self.get(APPLICATION_STORE_KEY) else {
            return Ok(None);
        };
        value.downcast::<PublishedStore>().map(|published| Some(Arc::clone(&published.0))).map_err(
            |_| {
                RelyingPartyError::Configuration(format!(
                    "application state key '{APPLICATION_STORE_KEY}' holds a value that is not a relying party store"
                ))
            },
        )
    }
}

impl fmt::Debug for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values.read();
        let mut keys: Vec<&String> = values.keys().collect();
        keys.sort();
        f.debug_struct("ApplicationState").field("keys", &keys).finish()
    }
}
