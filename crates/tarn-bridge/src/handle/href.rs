//! HandleRef — exclusive ownership of one remote reference
//!
//! Created when a reference crosses the boundary into this heap. While
//! it lives, the remote table pins the object; when it drops, the
//! remote-release call runs synchronously, exactly once. Equality is
//! identity: two wrappers are never interchangeable, so `PartialEq` is
//! deliberately not implemented.

use std::sync::Arc;

use tarn_bridge_abi::RawHandle;

use crate::fault::{BridgeFault, BridgeResult};

/// The remote-release hook a `HandleRef` runs on drop.
///
/// Implementations issue the counterpart's `ReleaseHandle` operation.
/// Releases of different handles may run concurrently; a given handle is
/// released at most once.
pub trait HandleReleaser: Send + Sync {
    /// Delete the remote reference behind `handle`.
    fn release(&self, handle: RawHandle) -> BridgeResult<()>;
}

/// Exclusive owner of one remote handle.
pub struct HandleRef {
    raw: RawHandle,
    releaser: Arc<dyn HandleReleaser>,
}

impl HandleRef {
    /// Wrap a handle that just crossed into this heap.
    ///
    /// The null sentinel is rejected with a precondition fault — a
    /// wrapped handle is never null.
    pub fn new(raw: RawHandle, releaser: Arc<dyn HandleReleaser>) -> BridgeResult<Self> {
        if raw.is_null() {
            return Err(BridgeFault::precondition(
                "cannot wrap the null handle".to_string(),
            ));
        }
        Ok(HandleRef { raw, releaser })
    }

    /// The raw handle, visible to the dispatch layer only.
    pub(crate) fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Release eagerly, consuming the wrapper.
    ///
    /// Surfaces the release fault the drop path would only log. A second
    /// dispose is unrepresentable — the wrapper is gone.
    pub fn dispose(self) -> BridgeResult<()> {
        let result = self.releaser.release(self.raw);
        std::mem::forget(self);
        result
    }

    /// Hand the raw handle over without releasing — ownership of the
    /// remote reference transfers across the boundary with it.
    pub(crate) fn into_raw(self) -> RawHandle {
        let raw = self.raw;
        std::mem::forget(self);
        raw
    }
}

impl Drop for HandleRef {
    fn drop(&mut self) {
        if let Err(fault) = self.releaser.release(self.raw) {
            tracing::warn!(handle = %self.raw, %fault, "remote release failed");
        }
    }
}

impl std::fmt::Debug for HandleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HandleRef").field(&self.raw).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingReleaser {
        calls: AtomicUsize,
    }

    impl HandleReleaser for CountingReleaser {
        fn release(&self, _handle: RawHandle) -> BridgeResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_null_handle_rejected() {
        let releaser = Arc::new(CountingReleaser::default());
        let err = HandleRef::new(RawHandle::NULL, releaser.clone()).unwrap_err();
        assert!(matches!(err, BridgeFault::Runtime(_)));
        assert_eq!(releaser.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wraps_live_handle() {
        let releaser = Arc::new(CountingReleaser::default());
        let href = HandleRef::new(RawHandle(17), releaser).unwrap();
        assert_eq!(href.raw(), RawHandle(17));
    }

    #[test]
    fn test_release_runs_exactly_once_on_drop() {
        let releaser = Arc::new(CountingReleaser::default());
        let href = HandleRef::new(RawHandle(1), releaser.clone()).unwrap();

        // Never before unreachability.
        assert_eq!(releaser.calls.load(Ordering::SeqCst), 0);
        drop(href);
        assert_eq!(releaser.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_releases_once_and_consumes() {
        let releaser = Arc::new(CountingReleaser::default());
        let href = HandleRef::new(RawHandle(2), releaser.clone()).unwrap();
        href.dispose().unwrap();
        assert_eq!(releaser.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_into_raw_transfers_without_release() {
        let releaser = Arc::new(CountingReleaser::default());
        let href = HandleRef::new(RawHandle(3), releaser.clone()).unwrap();
        assert_eq!(href.into_raw(), RawHandle(3));
        assert_eq!(releaser.calls.load(Ordering::SeqCst), 0);
    }
}
