//! # Instance Registry
//!
//! Concurrent mapping from an Opaque Native Handle to the managed object that
//! owns it. The foreign callback signature is fixed and carries no closure
//! state, so this table is how a trampoline finds its way back to a client.
//!
//! ## Concurrency
//!
//! - Lookups take a shared read lock and may run concurrently from any
//!   number of foreign-owned threads.
//! - `register`/`unregister` take the exclusive write lock. They happen
//!   exactly twice per client lifecycle, from the owning thread.
//! - Entries are [`Weak`]: the registry never keeps a client alive. A lookup
//!   that races with teardown either finds nothing or finds an object whose
//!   strong count already dropped to zero, which `upgrade` also reports as
//!   nothing. Callers drop the event in both cases.

use crate::ffi::RawHandle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A live object is already registered under this handle.
    #[error("Handle {0} already has a live registry entry")]
    HandleAlreadyRegistered(RawHandle),
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    /// Entries currently in the table.
    pub entries: usize,
    /// Entries whose object is still alive.
    pub live: usize,
}

/// Handle-to-object table with readers-writer discipline.
pub struct InstanceRegistry<T> {
    instances: RwLock<HashMap<RawHandle, Weak<T>>>,
}

impl<T> InstanceRegistry<T> {
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Install the mapping for `handle`.
    ///
    /// An entry whose object is already gone is replaced; an entry whose
    /// object is still alive is an invariant violation and is rejected.
    pub fn register(&self, handle: RawHandle, instance: &Arc<T>) -> Result<(), RegistryError> {
        let mut instances = self.instances.write();
        if let Some(existing) = instances.get(&handle) {
            if existing.strong_count() > 0 {
                return Err(RegistryError::HandleAlreadyRegistered(handle));
            }
        }
        instances.insert(handle, Arc::downgrade(instance));
        debug!(handle = %handle, "Registered instance");
        Ok(())
    }

    /// Find the object for `handle`, if it is registered and still alive.
    pub fn lookup(&self, handle: RawHandle) -> Option<Arc<T>> {
        let instance = self.instances.read().get(&handle).and_then(Weak::upgrade);
        if instance.is_none() {
            trace!(handle = %handle, "No live instance for handle");
        }
        instance
    }

    /// Remove the mapping for `handle`. Idempotent; returns whether an entry
    /// was removed.
    pub fn unregister(&self, handle: RawHandle) -> bool {
        let removed = self.instances.write().remove(&handle).is_some();
        if removed {
            debug!(handle = %handle, "Unregistered instance");
        }
        removed
    }

    pub fn contains(&self, handle: RawHandle) -> bool {
        self.instances.read().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let instances = self.instances.read();
        RegistryStats {
            entries: instances.len(),
            live: instances
                .values()
                .filter(|instance| instance.strong_count() > 0)
                .count(),
        }
    }
}

impl<T> Default for InstanceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for InstanceRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::mosquitto;
    use std::sync::Barrier;
    use std::thread;

    fn handle(addr: usize) -> RawHandle {
        RawHandle::from_ptr(addr as *mut mosquitto).unwrap()
    }

    #[test]
    fn test_register_then_lookup() {
        let registry = InstanceRegistry::new();
        let client = Arc::new("client");
        registry.register(handle(0x10), &client).unwrap();

        let found = registry.lookup(handle(0x10)).unwrap();
        assert!(Arc::ptr_eq(&found, &client));
        assert!(registry.lookup(handle(0x20)).is_none());
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = InstanceRegistry::new();
        let client = Arc::new(1u32);
        registry.register(handle(0x10), &client).unwrap();

        assert!(registry.unregister(handle(0x10)));
        assert!(!registry.unregister(handle(0x10)));
        assert!(!registry.unregister(handle(0x30)));
        assert!(registry.lookup(handle(0x10)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_live_registration_is_rejected() {
        let registry = InstanceRegistry::new();
        let first = Arc::new(1u32);
        let second = Arc::new(2u32);
        registry.register(handle(0x10), &first).unwrap();

        assert_eq!(
            registry.register(handle(0x10), &second),
            Err(RegistryError::HandleAlreadyRegistered(handle(0x10)))
        );
        assert_eq!(*registry.lookup(handle(0x10)).unwrap(), 1);
    }

    #[test]
    fn test_dead_entry_can_be_replaced() {
        let registry = InstanceRegistry::new();
        let first = Arc::new(1u32);
        registry.register(handle(0x10), &first).unwrap();
        drop(first);

        assert!(registry.lookup(handle(0x10)).is_none());
        assert_eq!(registry.stats(), RegistryStats { entries: 1, live: 0 });

        let second = Arc::new(2u32);
        registry.register(handle(0x10), &second).unwrap();
        assert_eq!(*registry.lookup(handle(0x10)).unwrap(), 2);
    }

    #[test]
    fn test_registry_does_not_keep_instances_alive() {
        let registry = InstanceRegistry::new();
        let client = Arc::new(String::from("x"));
        registry.register(handle(0x10), &client).unwrap();
        assert_eq!(Arc::strong_count(&client), 1);
    }

    #[test]
    fn test_unregister_is_visible_from_another_thread() {
        let registry = Arc::new(InstanceRegistry::new());
        let client = Arc::new(7u32);
        registry.register(handle(0x40), &client).unwrap();
        registry.unregister(handle(0x40));

        let reader = Arc::clone(&registry);
        let found = thread::spawn(move || reader.lookup(handle(0x40)).is_some())
            .join()
            .unwrap();
        assert!(!found);
    }

    #[test]
    fn test_concurrent_lookups_observe_the_same_instance() {
        const READERS: usize = 8;
        let registry = Arc::new(InstanceRegistry::new());
        let client = Arc::new(42u64);
        registry.register(handle(0x50), &client).unwrap();
        let barrier = Arc::new(Barrier::new(READERS));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..1_000)
                        .map(|_| registry.lookup(handle(0x50)).unwrap())
                        .last()
                        .unwrap()
                })
            })
            .collect();

        for reader in readers {
            let seen = reader.join().unwrap();
            assert!(Arc::ptr_eq(&seen, &client));
        }
    }
}
