//! CompilerIsolate — the compiler runtime's side of the bridge
//!
//! Owns the compiler-heap handle table, the bootstrap guards, the weak
//! runtime-registration slot, the teardown hooks, and the entry-point
//! surface the host resolves its dispatch table against.

mod entry;
mod instance;

pub(crate) use instance::CompilerInstance;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tarn_bridge_abi::{DispatchSurface, NamedOperation, WireValue};

use crate::api::{CompilerFactory, CompilerRuntime};
use crate::context::ContextControl;
use crate::fault::{to_envelope, BridgeFault, BridgeResult};
use crate::handle::HandleTable;
use crate::port::HostPort;
use crate::registry::{CompilerOp, OperationId};

/// The compiler runtime's bridge endpoint.
pub struct CompilerIsolate {
    table: Arc<HandleTable>,
    contexts: Arc<ContextControl>,
    port: Arc<HostPort>,
    factory: Arc<dyn CompilerFactory>,
    lookup_claimed: AtomicBool,
    initialized: AtomicBool,
    runtime_slot: Mutex<Option<Weak<dyn CompilerRuntime>>>,
    teardown: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl CompilerIsolate {
    /// Create an isolate around the external compiler factory.
    pub fn new(factory: Arc<dyn CompilerFactory>) -> Arc<Self> {
        Arc::new(CompilerIsolate {
            table: Arc::new(HandleTable::new()),
            contexts: Arc::new(ContextControl::new()),
            port: Arc::new(HostPort::new()),
            factory,
            lookup_claimed: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            runtime_slot: Mutex::new(None),
            teardown: Mutex::new(Vec::new()),
        })
    }

    /// One-time isolate initialization: opens the process-wide global
    /// compilation context and installs the default teardown hook. A
    /// second call is an illegal-state fault.
    pub fn initialize_isolate(&self) -> BridgeResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(BridgeFault::illegal_state("isolate already initialized"));
        }
        self.contexts.open_global()?;
        let contexts = self.contexts.clone();
        self.register_teardown(move || contexts.close_global());
        Ok(())
    }

    pub(crate) fn ensure_initialized(&self) -> BridgeResult<()> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(BridgeFault::illegal_state("isolate not initialized"));
        }
        Ok(())
    }

    /// Register a hook to run at shutdown. Hooks run in reverse
    /// registration order, once.
    pub fn register_teardown(&self, hook: impl FnOnce() + Send + 'static) {
        self.teardown.lock().push(Box::new(hook));
    }

    pub(crate) fn run_teardown(&self) {
        let mut hooks = std::mem::take(&mut *self.teardown.lock());
        while let Some(hook) = hooks.pop() {
            hook();
        }
    }

    /// Register a weak reference to the host runtime.
    ///
    /// Returns `false` while a prior registration is still alive,
    /// without replacing it (first wins, under the slot lock); a dead
    /// prior registration is replaced.
    pub fn register_runtime(&self, runtime: &Arc<dyn CompilerRuntime>) -> bool {
        let mut slot = self.runtime_slot.lock();
        if let Some(prior) = slot.as_ref() {
            if prior.upgrade().is_some() {
                return false;
            }
        }
        *slot = Some(Arc::downgrade(runtime));
        true
    }

    /// The registered host runtime, if it is still alive.
    pub fn registered_runtime(&self) -> Option<Arc<dyn CompilerRuntime>> {
        self.runtime_slot.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Claim the single-use bootstrap lookup exchange. The table may
    /// never be rebuilt: every later claim fails, regardless of whether
    /// the first exchange succeeded.
    pub(crate) fn claim_lookup(&self) -> BridgeResult<()> {
        if self.lookup_claimed.swap(true, Ordering::SeqCst) {
            return Err(BridgeFault::illegal_state(
                "bootstrap lookup already initialized",
            ));
        }
        Ok(())
    }

    pub(crate) fn port(&self) -> &Arc<HostPort> {
        &self.port
    }

    /// Number of live compiler-heap handles (diagnostics and tests).
    pub fn handle_count(&self) -> usize {
        self.table.len()
    }

    /// The entry-point surface the host resolves its dispatch table
    /// against.
    pub fn surface(self: &Arc<Self>) -> Arc<dyn DispatchSurface> {
        Arc::new(IsolateSurface {
            isolate: self.clone(),
        })
    }
}

struct IsolateSurface {
    isolate: Arc<CompilerIsolate>,
}

type EntryFn = fn(&Arc<CompilerIsolate>, &[WireValue]) -> BridgeResult<WireValue>;

fn entry_op(isolate: &Arc<CompilerIsolate>, op: CompilerOp, f: EntryFn) -> NamedOperation {
    let isolate = isolate.clone();
    let name = op.canonical_name();
    NamedOperation::new(name, move |args| {
        tracing::trace!(op = name, "compiler entry");
        f(&isolate, args).map_err(|fault| to_envelope(&fault))
    })
}

impl DispatchSurface for IsolateSurface {
    fn operations(&self) -> Vec<NamedOperation> {
        let iso = &self.isolate;
        vec![
            entry_op(iso, CompilerOp::InitializeRuntime, entry::initialize_runtime),
            entry_op(iso, CompilerOp::NewCompiler, entry::new_compiler),
            entry_op(iso, CompilerOp::InitializeCompiler, entry::initialize_compiler),
            entry_op(iso, CompilerOp::DoCompile, entry::do_compile),
            entry_op(iso, CompilerOp::Shutdown, entry::shutdown),
            entry_op(
                iso,
                CompilerOp::InstallCallBoundaryMethod,
                entry::install_call_boundary_method,
            ),
            entry_op(
                iso,
                CompilerOp::InstallReservedSlotMethod,
                entry::install_reserved_slot_method,
            ),
            entry_op(
                iso,
                CompilerOp::PurgePartialEvalCaches,
                entry::purge_partial_eval_caches,
            ),
            entry_op(
                iso,
                CompilerOp::GetCompilerConfigurationName,
                entry::get_compiler_configuration_name,
            ),
            entry_op(iso, CompilerOp::GetSuppliedString, entry::get_supplied_string),
            entry_op(iso, CompilerOp::ReleaseHandle, entry::release_handle),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AssumptionConsumer, AssumptionToken, UnitCompiler};
    use crate::options::CompilerOptionsMap;

    struct NoFactory;

    impl CompilerFactory for NoFactory {
        fn create(
            &self,
            _runtime: Arc<dyn CompilerRuntime>,
        ) -> BridgeResult<Arc<dyn UnitCompiler>> {
            Err(BridgeFault::illegal_state("no compiler in this test"))
        }
    }

    struct IdleRuntime;

    impl CompilerRuntime for IdleRuntime {
        fn log(&self, _message: &str) -> BridgeResult<()> {
            Ok(())
        }

        fn initial_options(&self) -> BridgeResult<CompilerOptionsMap> {
            Ok(CompilerOptionsMap::new())
        }

        fn register_optimized_assumption(
            &self,
            _assumption: AssumptionToken,
        ) -> BridgeResult<Option<Arc<dyn AssumptionConsumer>>> {
            Ok(None)
        }
    }

    #[test]
    fn test_initialize_isolate_is_one_time() {
        let iso = CompilerIsolate::new(Arc::new(NoFactory));
        iso.initialize_isolate().unwrap();
        assert!(iso.initialize_isolate().is_err());
    }

    #[test]
    fn test_lookup_claim_never_rebuilds() {
        let iso = CompilerIsolate::new(Arc::new(NoFactory));
        iso.claim_lookup().unwrap();
        assert!(iso.claim_lookup().is_err());
        assert!(iso.claim_lookup().is_err());
    }

    #[test]
    fn test_register_runtime_first_wins_while_alive() {
        let iso = CompilerIsolate::new(Arc::new(NoFactory));
        let first: Arc<dyn CompilerRuntime> = Arc::new(IdleRuntime);
        let second: Arc<dyn CompilerRuntime> = Arc::new(IdleRuntime);

        assert!(iso.register_runtime(&first));
        // Alive prior registration: not replaced.
        assert!(!iso.register_runtime(&second));
        assert!(Arc::ptr_eq(&iso.registered_runtime().unwrap(), &first));
    }

    #[test]
    fn test_register_runtime_replaces_dead_registration() {
        let iso = CompilerIsolate::new(Arc::new(NoFactory));
        let first: Arc<dyn CompilerRuntime> = Arc::new(IdleRuntime);
        assert!(iso.register_runtime(&first));
        drop(first);

        assert!(iso.registered_runtime().is_none());
        let second: Arc<dyn CompilerRuntime> = Arc::new(IdleRuntime);
        assert!(iso.register_runtime(&second));
        assert!(iso.registered_runtime().is_some());
    }

    #[test]
    fn test_teardown_hooks_run_once_in_reverse() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let iso = CompilerIsolate::new(Arc::new(NoFactory));
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let runs = Arc::new(AtomicUsize::new(0));

        for tag in ["first", "second"] {
            let order = order.clone();
            let runs = runs.clone();
            iso.register_teardown(move || {
                order.lock().push(tag);
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        iso.run_teardown();
        iso.run_teardown();
        assert_eq!(*order.lock(), vec!["second", "first"]);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_surface_covers_every_compiler_op() {
        let iso = CompilerIsolate::new(Arc::new(NoFactory));
        let names: Vec<&str> = iso
            .surface()
            .operations()
            .iter()
            .map(|op| op.name)
            .collect();
        for &op in CompilerOp::all() {
            assert!(
                names.contains(&op.canonical_name()),
                "surface is missing {:?}",
                op
            );
        }
        assert_eq!(names.len(), CompilerOp::all().len());
    }
}
