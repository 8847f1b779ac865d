//! Per-heap handle table
//!
//! Maps opaque handles to strong references on exported objects. An
//! entry exists exactly while the other side holds references on it:
//! default export reference-counts repeated exports of the same object
//! under one handle; releasing drops one reference and removes the entry
//! at zero, letting the local collector reclaim the object.

use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tarn_bridge_abi::RawHandle;

use crate::fault::{BridgeResult, RuntimeFault};

struct Entry {
    object: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    refs: AtomicUsize,
    identity_key: Option<usize>,
}

/// Handle table for one heap.
///
/// Safe for unsynchronized concurrent use; releases of different handles
/// touch disjoint entries.
pub struct HandleTable {
    entries: DashMap<RawHandle, Entry>,
    identity: DashMap<usize, RawHandle>,
    next: AtomicU64,
}

impl HandleTable {
    /// Create an empty table. Handle ids start at 1; 0 stays the null
    /// sentinel.
    pub fn new() -> Self {
        HandleTable {
            entries: DashMap::new(),
            identity: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }

    fn alloc(&self) -> RawHandle {
        RawHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Export an object, pinning it until every reference is released.
    ///
    /// Exporting the same object again reuses the existing handle and
    /// bumps its reference count — one reference per crossing, one
    /// handle per live object.
    pub fn export<T: Any + Send + Sync>(&self, object: Arc<T>) -> RawHandle {
        let key = Arc::as_ptr(&object) as usize;
        if let Some(existing) = self.identity.get(&key) {
            let handle = *existing;
            if let Some(entry) = self.entries.get(&handle) {
                entry.refs.fetch_add(1, Ordering::AcqRel);
                return handle;
            }
        }
        let handle = self.alloc();
        self.entries.insert(
            handle,
            Entry {
                object,
                type_name: std::any::type_name::<T>(),
                refs: AtomicUsize::new(1),
                identity_key: Some(key),
            },
        );
        self.identity.insert(key, handle);
        handle
    }

    /// Export an object under a fresh handle even if it is already
    /// exported — the opt-in duplicate-reference path.
    pub fn export_duplicate<T: Any + Send + Sync>(&self, object: Arc<T>) -> RawHandle {
        let handle = self.alloc();
        self.entries.insert(
            handle,
            Entry {
                object,
                type_name: std::any::type_name::<T>(),
                refs: AtomicUsize::new(1),
                identity_key: None,
            },
        );
        handle
    }

    /// Resolve a handle to its object, checked against the expected type.
    ///
    /// This is the only translation from handle to object; a wrong
    /// expectation is a structured type-mismatch fault, never a cast.
    pub fn resolve<T: Any + Send + Sync>(&self, handle: RawHandle) -> BridgeResult<Arc<T>> {
        let entry = self
            .entries
            .get(&handle)
            .ok_or(RuntimeFault::UnknownHandle(handle))?;
        let object = entry.object.clone();
        let got = entry.type_name;
        drop(entry);
        object.downcast::<T>().map_err(|_| {
            RuntimeFault::TypeMismatch {
                expected: std::any::type_name::<T>(),
                got: got.to_string(),
            }
            .into()
        })
    }

    /// Drop one reference on a handle; the entry is removed when the
    /// count reaches zero. Releasing an absent handle is a surfaced
    /// fault, not a no-op.
    pub fn release(&self, handle: RawHandle) -> BridgeResult<()> {
        let entry = self
            .entries
            .get(&handle)
            .ok_or(RuntimeFault::UnknownHandle(handle))?;
        let last = entry.refs.fetch_sub(1, Ordering::AcqRel) == 1;
        drop(entry);
        if last {
            if let Some((_, entry)) = self.entries.remove(&handle) {
                if let Some(key) = entry.identity_key {
                    self.identity.remove(&key);
                }
            }
        }
        Ok(())
    }

    /// Release a handle if it is still present. Used by teardown paths
    /// that must not fault when the remote side already released.
    pub fn release_if_present(&self, handle: RawHandle) -> bool {
        if self.entries.contains_key(&handle) {
            self.release(handle).is_ok()
        } else {
            false
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no live entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry (isolate teardown).
    pub fn clear(&self) {
        self.entries.clear();
        self.identity.clear();
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::BridgeFault;

    struct Payload(&'static str);

    #[test]
    fn test_export_resolve_release() {
        let table = HandleTable::new();
        let handle = table.export(Arc::new(Payload("a")));
        assert!(!handle.is_null());

        let resolved = table.resolve::<Payload>(handle).unwrap();
        assert_eq!(resolved.0, "a");

        table.release(handle).unwrap();
        assert!(table.is_empty());
        assert!(table.resolve::<Payload>(handle).is_err());
    }

    #[test]
    fn test_export_same_object_reuses_handle() {
        let table = HandleTable::new();
        let object = Arc::new(Payload("x"));

        let h1 = table.export(object.clone());
        let h2 = table.export(object.clone());
        assert_eq!(h1, h2);
        assert_eq!(table.len(), 1);

        // Two crossings, two releases before the entry goes away.
        table.release(h1).unwrap();
        assert_eq!(table.len(), 1);
        table.release(h2).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_export_duplicate_mints_fresh_handle() {
        let table = HandleTable::new();
        let object = Arc::new(Payload("x"));

        let h1 = table.export(object.clone());
        let h2 = table.export_duplicate(object.clone());
        assert_ne!(h1, h2);
        assert_eq!(table.len(), 2);

        table.release(h2).unwrap();
        // The default entry is untouched by releasing the duplicate.
        assert!(table.resolve::<Payload>(h1).is_ok());
        table.release(h1).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_release_absent_handle_faults() {
        let table = HandleTable::new();
        let err = table.release(RawHandle(42)).unwrap_err();
        assert!(matches!(
            err,
            BridgeFault::Runtime(RuntimeFault::UnknownHandle(RawHandle(42)))
        ));
    }

    #[test]
    fn test_resolve_wrong_type_is_mismatch_not_cast() {
        let table = HandleTable::new();
        let handle = table.export(Arc::new(Payload("a")));
        let err = table.resolve::<String>(handle).unwrap_err();
        assert!(matches!(
            err,
            BridgeFault::Runtime(RuntimeFault::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_pin_keeps_object_alive() {
        let table = HandleTable::new();
        let object = Arc::new(Payload("pinned"));
        let weak = Arc::downgrade(&object);

        let handle = table.export(object);
        assert!(weak.upgrade().is_some());

        table.release(handle).unwrap();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_concurrent_release_disjoint_handles() {
        let table = Arc::new(HandleTable::new());
        let handles: Vec<RawHandle> = (0..64)
            .map(|i| table.export_duplicate(Arc::new(i as u64)))
            .collect();

        std::thread::scope(|scope| {
            for chunk in handles.chunks(16) {
                let table = table.clone();
                scope.spawn(move || {
                    for &handle in chunk {
                        table.release(handle).unwrap();
                    }
                });
            }
        });
        assert!(table.is_empty());
    }
}
