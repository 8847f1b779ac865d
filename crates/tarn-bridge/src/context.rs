//! Compilation contexts — global and per-call local scopes
//!
//! The compiler runtime operates under one process-wide global context
//! (opened at isolate initialization) with per-call local contexts
//! nested inside it. Local scopes open and close strictly LIFO relative
//! to a single call and are released on every exit path, including
//! unwinding. Object-constant translation is only valid while a scope is
//! open.

use std::any::Any;
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tarn_bridge_abi::RawHandle;

use crate::fault::{BridgeFault, BridgeResult};
use crate::handle::HandleTable;

thread_local! {
    // Compile requests are confined to one thread end-to-end, so local
    // nesting depth is per-thread state.
    static LOCAL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Context bookkeeping for one compiler isolate.
pub struct ContextControl {
    global_open: AtomicBool,
}

impl ContextControl {
    /// Create with no context open.
    pub fn new() -> Self {
        ContextControl {
            global_open: AtomicBool::new(false),
        }
    }

    /// Open the process-wide global context. A second open is an
    /// illegal-state fault.
    pub fn open_global(&self) -> BridgeResult<()> {
        if self.global_open.swap(true, Ordering::SeqCst) {
            return Err(BridgeFault::illegal_state("global context already open"));
        }
        Ok(())
    }

    /// Close the global context at isolate teardown.
    pub fn close_global(&self) {
        self.global_open.store(false, Ordering::SeqCst);
    }

    /// Whether the global context is open.
    pub fn is_global_open(&self) -> bool {
        self.global_open.load(Ordering::SeqCst)
    }

    /// Local nesting depth on the calling thread.
    pub fn local_depth(&self) -> usize {
        LOCAL_DEPTH.with(|d| d.get())
    }

    /// Open a local context scope for one call. The guard closes it on
    /// drop, on every exit path.
    pub fn enter_local(&self) -> BridgeResult<LocalContextGuard<'_>> {
        if !self.is_global_open() {
            return Err(BridgeFault::illegal_state(
                "local context requires the global context",
            ));
        }
        let depth = LOCAL_DEPTH.with(|d| {
            let next = d.get() + 1;
            d.set(next);
            next
        });
        Ok(LocalContextGuard {
            depth,
            _control: PhantomData,
            _not_send: PhantomData,
        })
    }

    /// Translate a boxed object constant, valid only while a scope is
    /// open on this thread.
    pub fn translate_constant(
        &self,
        table: &HandleTable,
        handle: RawHandle,
    ) -> BridgeResult<Arc<dyn Any + Send + Sync>> {
        if !self.is_global_open() && self.local_depth() == 0 {
            return Err(BridgeFault::illegal_state(
                "constant translation outside any compilation context",
            ));
        }
        table.resolve::<ConstantBox>(handle).map(|b| b.0.clone())
    }
}

impl Default for ContextControl {
    fn default() -> Self {
        Self::new()
    }
}

/// A boxed VM constant registered for translation within a context.
pub struct ConstantBox(pub Arc<dyn Any + Send + Sync>);

/// RAII guard for one local context scope.
///
/// Thread-confined by construction (not `Send`): a scope is always
/// closed on the thread that opened it, in LIFO order.
pub struct LocalContextGuard<'a> {
    depth: usize,
    _control: PhantomData<&'a ContextControl>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for LocalContextGuard<'_> {
    fn drop(&mut self) {
        LOCAL_DEPTH.with(|d| {
            let current = d.get();
            debug_assert_eq!(current, self.depth, "local contexts must close LIFO");
            if current != self.depth {
                tracing::error!(
                    expected = self.depth,
                    current,
                    "local context closed out of order"
                );
            }
            d.set(current.saturating_sub(1));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_opens_once() {
        let control = ContextControl::new();
        control.open_global().unwrap();
        assert!(control.open_global().is_err());
        control.close_global();
        control.open_global().unwrap();
    }

    #[test]
    fn test_local_requires_global() {
        let control = ContextControl::new();
        assert!(control.enter_local().is_err());
        control.open_global().unwrap();
        assert!(control.enter_local().is_ok());
    }

    #[test]
    fn test_local_scopes_nest_lifo() {
        let control = ContextControl::new();
        control.open_global().unwrap();
        assert_eq!(control.local_depth(), 0);
        {
            let _outer = control.enter_local().unwrap();
            assert_eq!(control.local_depth(), 1);
            {
                let _inner = control.enter_local().unwrap();
                assert_eq!(control.local_depth(), 2);
            }
            assert_eq!(control.local_depth(), 1);
        }
        assert_eq!(control.local_depth(), 0);
    }

    #[test]
    fn test_local_scope_released_on_unwind() {
        let control = ContextControl::new();
        control.open_global().unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = control.enter_local().unwrap();
            panic!("compile blew up");
        }));
        assert!(result.is_err());
        assert_eq!(control.local_depth(), 0);
    }

    #[test]
    fn test_constant_translation_gated_by_scope() {
        let control = ContextControl::new();
        let table = HandleTable::new();
        let constant = Arc::new(ConstantBox(Arc::new(42u64)));
        let handle = table.export(constant);

        // No context open: translation is invalid.
        assert!(control.translate_constant(&table, handle).is_err());

        control.open_global().unwrap();
        let boxed = control.translate_constant(&table, handle).unwrap();
        assert_eq!(*boxed.downcast::<u64>().unwrap(), 42);
    }
}
