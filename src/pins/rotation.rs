use super::PinStore;
use std::sync::{Arc, PoisonError, RwLock};

/// A swappable reference to the current [`PinStore`].
///
/// Rotation always replaces the whole store. A handshake takes one snapshot
/// up front and checks against it, so it never sees a half-updated set of pins.
#[derive(Debug, Default)]
pub struct PinStoreHandle {
    current: RwLock<Arc<PinStore>>,
}

impl PinStoreHandle {
    /// Creates a handle that initially serves `store`.
    pub fn new(store: PinStore) -> Self {
        Self {
            current: RwLock::new(Arc::new(store)),
        }
    }

    /// The store that new handshakes will be checked against.
    pub fn snapshot(&self) -> Arc<PinStore> {
        // The lock only guards an `Arc` swap, so a panic elsewhere can't leave it inconsistent.
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Atomically replaces the current store, returning the previous one.
    pub fn replace(&self, store: PinStore) -> Arc<PinStore> {
        let store = Arc::new(store);
        log::debug!("rotating pin store, now covering {} host(s)", store.len());

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, store)
    }
}
