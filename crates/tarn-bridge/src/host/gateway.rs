//! CompilerGateway — the host's typed driver for the compiler runtime
//!
//! Wraps the resolved host→compiler operation table behind the ordered
//! entry-point protocol. Remote objects come back as typed handle
//! wrappers (`RuntimeHandle`, `CompilerHandle`) whose drop releases the
//! compiler-heap reference.

use std::sync::Arc;

use tarn_bridge_abi::convert::{result_handle, result_str, result_unit};
use tarn_bridge_abi::{OperationTarget, WireValue};

use crate::api::{CompilationTask, Compilable, CompilerListener, CompilerRuntime, MethodToken};
use crate::fault::{from_envelope, BridgeResult};
use crate::handle::{HandleRef, HandleReleaser};
use crate::host::session::CompilationSession;
use crate::host::surface::{HostObject, HostSurface};
use crate::options::CompilerOptionsMap;
use crate::port::RemoteReleaser;
use crate::registry::{CompilerOp, OperationId, OperationRegistry};

/// Host-side owner of the compiler runtime's runtime-proxy handle.
pub struct RuntimeHandle {
    href: HandleRef,
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle").finish_non_exhaustive()
    }
}

/// Host-side owner of a compiler-instance handle.
pub struct CompilerHandle {
    href: HandleRef,
}

/// The host's connection to the compiler runtime, built by
/// `initialize_lookup`.
pub struct CompilerGateway {
    registry: Arc<OperationRegistry<CompilerOp>>,
    surface: Arc<HostSurface>,
    releaser: Arc<dyn HandleReleaser>,
}

impl std::fmt::Debug for CompilerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerGateway").finish_non_exhaustive()
    }
}

impl CompilerGateway {
    pub(crate) fn new(
        registry: Arc<OperationRegistry<CompilerOp>>,
        surface: Arc<HostSurface>,
    ) -> Self {
        let releaser = Arc::new(RemoteReleaser::new(
            registry.lookup(CompilerOp::ReleaseHandle).clone(),
        ));
        CompilerGateway {
            registry,
            surface,
            releaser,
        }
    }

    fn target(&self, op: CompilerOp) -> &OperationTarget {
        self.registry.lookup(op)
    }

    fn call(&self, op: CompilerOp, args: &[WireValue]) -> BridgeResult<WireValue> {
        tracing::trace!(op = op.canonical_name(), "gateway call");
        (self.target(op))(args).map_err(from_envelope)
    }

    /// The host surface this gateway exports objects through.
    pub fn host_surface(&self) -> &Arc<HostSurface> {
        &self.surface
    }

    /// Build the compiler-side runtime proxy for the host runtime.
    pub fn initialize_runtime(
        &self,
        runtime: Arc<dyn CompilerRuntime>,
    ) -> BridgeResult<RuntimeHandle> {
        let exported = self.surface.export(HostObject::Runtime(runtime));
        let result = self
            .call(CompilerOp::InitializeRuntime, &[WireValue::Handle(exported)])
            .and_then(|value| Ok(result_handle(value)?));
        match result {
            Ok(handle) => Ok(RuntimeHandle {
                href: HandleRef::new(handle, self.releaser.clone())?,
            }),
            Err(fault) => {
                // The compiler side never claimed the export.
                self.surface.table().release_if_present(exported);
                Err(fault)
            }
        }
    }

    /// Build an optimizer bound to the runtime proxy.
    pub fn new_compiler(&self, runtime: &RuntimeHandle) -> BridgeResult<CompilerHandle> {
        let value = self.call(
            CompilerOp::NewCompiler,
            &[WireValue::Handle(runtime.href.raw())],
        )?;
        Ok(CompilerHandle {
            href: HandleRef::new(result_handle(value)?, self.releaser.clone())?,
        })
    }

    /// First-use initialization against a specific compilable; re-runs
    /// only when `reinitialize` is set.
    pub fn initialize_compiler(
        &self,
        compiler: &CompilerHandle,
        compilable: Arc<dyn Compilable>,
        options: &CompilerOptionsMap,
        reinitialize: bool,
    ) -> BridgeResult<()> {
        let exported = self.surface.export(HostObject::Compilable(compilable));
        let result = self.call(
            CompilerOp::InitializeCompiler,
            &[
                WireValue::Handle(compiler.href.raw()),
                WireValue::Handle(exported),
                WireValue::Bytes(options.encode()?),
                WireValue::Bool(reinitialize),
            ],
        );
        self.surface.table().release_if_present(exported);
        result_unit(result?)?;
        Ok(())
    }

    /// Compile one unit. An absent task means an unconditional,
    /// non-cancellable compile; an absent listener means no progress
    /// callbacks.
    pub fn do_compile(
        &self,
        compiler: &CompilerHandle,
        task: Option<Arc<dyn CompilationTask>>,
        compilable: Arc<dyn Compilable>,
        listener: Option<Arc<dyn CompilerListener>>,
    ) -> BridgeResult<()> {
        let session = CompilationSession::new(&self.surface, compilable, task, listener);
        let result = self.call(
            CompilerOp::DoCompile,
            &[
                WireValue::Handle(compiler.href.raw()),
                session.task_value(),
                session.compilable_value(),
                session.listener_value(),
            ],
        );
        // Session teardown runs on every path, reclaiming anything the
        // compiler side never claimed.
        drop(session);
        result_unit(result?)?;
        Ok(())
    }

    /// Release compiler resources. A second call is a caller error.
    pub fn shutdown(&self, compiler: &CompilerHandle) -> BridgeResult<()> {
        let value = self.call(
            CompilerOp::Shutdown,
            &[WireValue::Handle(compiler.href.raw())],
        )?;
        Ok(result_unit(value)?)
    }

    /// Record call-boundary metadata for a resolved method.
    pub fn install_call_boundary_method(
        &self,
        compiler: &CompilerHandle,
        method: MethodToken,
    ) -> BridgeResult<()> {
        let value = self.call(
            CompilerOp::InstallCallBoundaryMethod,
            &[
                WireValue::Handle(compiler.href.raw()),
                WireValue::I64(method.0 as i64),
            ],
        )?;
        Ok(result_unit(value)?)
    }

    /// Record reserved-slot metadata for a resolved method.
    pub fn install_reserved_slot_method(
        &self,
        compiler: &CompilerHandle,
        method: MethodToken,
    ) -> BridgeResult<()> {
        let value = self.call(
            CompilerOp::InstallReservedSlotMethod,
            &[
                WireValue::Handle(compiler.href.raw()),
                WireValue::I64(method.0 as i64),
            ],
        )?;
        Ok(result_unit(value)?)
    }

    /// Clear the compiler's partial-evaluation memoization. Safe at any
    /// time; affects only subsequent compile latency.
    pub fn purge_partial_eval_caches(&self, compiler: &CompilerHandle) -> BridgeResult<()> {
        let value = self.call(
            CompilerOp::PurgePartialEvalCaches,
            &[WireValue::Handle(compiler.href.raw())],
        )?;
        Ok(result_unit(value)?)
    }

    /// Name of the active compiler configuration.
    pub fn compiler_configuration_name(&self, compiler: &CompilerHandle) -> BridgeResult<String> {
        let value = self.call(
            CompilerOp::GetCompilerConfigurationName,
            &[WireValue::Handle(compiler.href.raw())],
        )?;
        Ok(result_str(value)?)
    }
}
