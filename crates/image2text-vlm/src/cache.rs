use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, TryLockError},
};

use log::{debug, info};

use crate::{backend::BackendLoader, error::VlmError, identity::BackendIdentity};

/// A backend instance shared between requests, one generation at a time.
pub type SharedBackend<B> = Arc<Mutex<B>>;

// Holds the instance of one identity once loaded. Its lock is taken while loading.
type Slot<B> = Arc<Mutex<Option<SharedBackend<B>>>>;

fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// None while the slot is being loaded.
fn peek<B>(slot: &Slot<B>) -> Option<SharedBackend<B>> {
    match slot.try_lock() {
        Ok(loaded) => loaded.clone(),
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().clone(),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Keeps one backend instance per [`BackendIdentity`].
///
/// The first request for an identity loads the backend, later requests reuse it. The
/// instance is wrapped in a [`Mutex`] so that calls on the same instance are
/// serialized, while different identities run independently.
pub struct BackendCache<L: BackendLoader> {
    loader: L,
    slots: Mutex<HashMap<BackendIdentity, Slot<L::Backend>>>,
}

impl<L: BackendLoader> BackendCache<L> {
    /// An empty cache using `loader` to construct backends.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<BackendIdentity, Slot<L::Backend>>> {
        lock_recover(&self.slots)
    }

    /// Return the instance for `identity`, loading it on first use.
    ///
    /// Concurrent requests for the same identity wait for a single load, requests
    /// for other identities are not blocked by it. A failed load leaves nothing
    /// behind.
    pub fn get_or_load(
        &self,
        identity: &BackendIdentity,
    ) -> Result<SharedBackend<L::Backend>, VlmError> {
        let slot = self.slots().entry(identity.clone()).or_default().clone();

        let mut loaded = lock_recover(&slot);
        if let Some(backend) = loaded.as_ref() {
            debug!("reusing backend for {identity}");
            return Ok(backend.clone());
        }

        info!("loading backend for {identity}");
        match self.loader.load(identity) {
            Ok(backend) => {
                let backend = Arc::new(Mutex::new(backend));
                *loaded = Some(backend.clone());
                Ok(backend)
            }
            Err(e) => {
                drop(loaded);
                let mut slots = self.slots();
                if slots.get(identity).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                    slots.remove(identity);
                }
                Err(e)
            }
        }
    }

    /// Discard the instance for `identity`. The next request loads a new one.
    ///
    /// Never waits for a load in progress. Returns whether an entry was present.
    pub fn evict(&self, identity: &BackendIdentity) -> bool {
        let removed = self.slots().remove(identity).is_some();
        if removed {
            info!("evicted backend for {identity}");
        }
        removed
    }

    /// Discard the instance for `identity` only if it is still `backend`.
    ///
    /// An instance loaded in the meantime by another request is kept.
    pub fn evict_if_same(
        &self,
        identity: &BackendIdentity,
        backend: &SharedBackend<L::Backend>,
    ) -> bool {
        let mut slots = self.slots();
        let same = slots
            .get(identity)
            .and_then(peek)
            .is_some_and(|current| Arc::ptr_eq(&current, backend));
        if same {
            slots.remove(identity);
            info!("evicted backend for {identity}");
        }
        same
    }

    /// Whether an instance is loaded for `identity`.
    pub fn contains(&self, identity: &BackendIdentity) -> bool {
        self.slots().get(identity).and_then(peek).is_some()
    }

    /// Number of loaded instances.
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| peek(slot).is_some())
            .count()
    }

    /// Whether no instance is loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The loader backing this cache.
    pub fn loader(&self) -> &L {
        &self.loader
    }
}
