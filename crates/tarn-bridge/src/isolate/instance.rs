//! Compiler instance — one optimizer living behind a compiler handle

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tarn_bridge_abi::RawHandle;

use crate::api::{CompileEnv, Compilable, CompilerRuntime, MethodFlags, MethodToken, UnitCompiler};
use crate::cache::PartialEvalCache;
use crate::context::ContextControl;
use crate::fault::{BridgeFault, BridgeResult};
use crate::handle::HandleTable;
use crate::options::CompilerOptionsMap;
use crate::proxy::CompilerRuntimeProxy;

/// One optimizer bound to a runtime proxy, plus the per-compiler state
/// the entry operations act on.
pub(crate) struct CompilerInstance {
    compiler: Arc<dyn UnitCompiler>,
    runtime: Arc<CompilerRuntimeProxy>,
    table: Arc<HandleTable>,
    contexts: Arc<ContextControl>,
    initialized: AtomicBool,
    shut_down: AtomicBool,
    method_metadata: DashMap<MethodToken, MethodFlags>,
    pe_cache: PartialEvalCache,
}

impl CompilerInstance {
    pub(crate) fn new(
        compiler: Arc<dyn UnitCompiler>,
        runtime: Arc<CompilerRuntimeProxy>,
        table: Arc<HandleTable>,
        contexts: Arc<ContextControl>,
    ) -> Self {
        CompilerInstance {
            compiler,
            runtime,
            table,
            contexts,
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            method_metadata: DashMap::new(),
            pe_cache: PartialEvalCache::new(),
        }
    }

    pub(crate) fn compiler(&self) -> &dyn UnitCompiler {
        self.compiler.as_ref()
    }

    pub(crate) fn runtime_services(&self) -> &dyn CompilerRuntime {
        self.runtime.as_ref()
    }

    /// Fault if this compiler has been shut down.
    pub(crate) fn ensure_active(&self) -> BridgeResult<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(BridgeFault::illegal_state("compiler already shut down"));
        }
        Ok(())
    }

    /// First-use initialization; re-runs only when `reinitialize` is set.
    pub(crate) fn initialize(
        &self,
        compilable: &dyn Compilable,
        options: &CompilerOptionsMap,
        reinitialize: bool,
    ) -> BridgeResult<()> {
        self.ensure_active()?;
        if self.initialized.load(Ordering::SeqCst) && !reinitialize {
            return Ok(());
        }
        self.compiler.initialize(compilable, options)?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Release compiler resources. A second call is a caller error.
    pub(crate) fn shutdown(&self) -> BridgeResult<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Err(BridgeFault::illegal_state("compiler already shut down"));
        }
        self.compiler.shutdown()
    }

    pub(crate) fn install_call_boundary(&self, method: MethodToken) {
        self.method_metadata
            .entry(method)
            .and_modify(|flags| flags.call_boundary = true)
            .or_insert(MethodFlags {
                call_boundary: true,
                reserved_slot: false,
            });
    }

    pub(crate) fn install_reserved_slot(&self, method: MethodToken) {
        self.method_metadata
            .entry(method)
            .and_modify(|flags| flags.reserved_slot = true)
            .or_insert(MethodFlags {
                call_boundary: false,
                reserved_slot: true,
            });
    }
}

impl CompileEnv for CompilerInstance {
    fn method_flags(&self, method: MethodToken) -> MethodFlags {
        self.method_metadata
            .get(&method)
            .map(|flags| *flags)
            .unwrap_or_default()
    }

    fn partial_eval_cache(&self) -> &PartialEvalCache {
        &self.pe_cache
    }

    fn runtime(&self) -> &dyn CompilerRuntime {
        self.runtime.as_ref()
    }

    fn translate_constant(
        &self,
        handle: RawHandle,
    ) -> BridgeResult<Arc<dyn Any + Send + Sync>> {
        self.contexts.translate_constant(&self.table, handle)
    }
}
