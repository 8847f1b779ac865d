//! Entry-point operations the compiler runtime exposes to the host
//!
//! Each entry resolves its handles, does its work, and lets the surface
//! wrapper translate any fault into the wire envelope. Incoming object
//! handles are wrapped into proxies immediately, so a fault on any later
//! line still releases the host-side references on unwind.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tarn_bridge_abi::{Args, RawHandle, WireValue};

use crate::api::{
    Compilable, CompilationTask, CompilationTier, CompileEnv, CompileError, CompileRequest,
    CompilerListener, FailureDetail, MethodToken,
};
use crate::fault::{to_envelope, BridgeResult};
use crate::handle::{HandleRef, HandleReleaser, HandleTable};
use crate::isolate::{CompilerInstance, CompilerIsolate};
use crate::options::CompilerOptionsMap;
use crate::proxy::{CompilableProxy, CompilerRuntimeProxy, ListenerProxy, TaskProxy};

/// A failure diagnostic materialized on first read, not at failure time.
pub(crate) struct DiagnosticSupplier {
    text: OnceCell<String>,
    build: Box<dyn Fn() -> String + Send + Sync>,
}

impl DiagnosticSupplier {
    fn new(build: impl Fn() -> String + Send + Sync + 'static) -> Self {
        DiagnosticSupplier {
            text: OnceCell::new(),
            build: Box::new(build),
        }
    }

    pub(crate) fn get(&self) -> &str {
        self.text.get_or_init(|| (self.build)())
    }

    #[cfg(test)]
    fn is_materialized(&self) -> bool {
        self.text.get().is_some()
    }
}

/// Releaser for handles into the isolate's own table, used when the
/// isolate hands out references to its own objects.
struct LocalReleaser {
    table: Arc<HandleTable>,
}

impl HandleReleaser for LocalReleaser {
    fn release(&self, handle: RawHandle) -> BridgeResult<()> {
        self.table.release(handle)
    }
}

pub(super) fn initialize_runtime(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    iso.ensure_initialized()?;
    let a = Args::new(args, 1)?;
    let href = HandleRef::new(a.handle(0)?, iso.port.releaser()?)?;
    let proxy = Arc::new(CompilerRuntimeProxy::new(href, iso.port.clone()));
    Ok(WireValue::Handle(iso.table.export(proxy)))
}

pub(super) fn new_compiler(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    iso.ensure_initialized()?;
    if !iso.contexts.is_global_open() {
        return Err(crate::fault::BridgeFault::illegal_state(
            "new compiler requires the global compilation context",
        ));
    }
    let a = Args::new(args, 1)?;
    let runtime = iso.table.resolve::<CompilerRuntimeProxy>(a.handle(0)?)?;
    let compiler = iso.factory.create(runtime.clone())?;
    let instance = Arc::new(CompilerInstance::new(
        compiler,
        runtime,
        iso.table.clone(),
        iso.contexts.clone(),
    ));
    Ok(WireValue::Handle(iso.table.export(instance)))
}

pub(super) fn initialize_compiler(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    let a = Args::new(args, 4)?;
    let instance = iso.table.resolve::<CompilerInstance>(a.handle(0)?)?;
    let compilable = CompilableProxy::new(
        HandleRef::new(a.handle(1)?, iso.port.releaser()?)?,
        iso.port.clone(),
    );
    let mut options = CompilerOptionsMap::decode(a.bytes(2)?)?;
    let reinitialize = a.bool(3)?;

    // Host defaults underlie the per-compiler overrides.
    options.merge_defaults(&instance.runtime_services().initial_options()?);
    instance.initialize(&compilable, &options, reinitialize)?;
    Ok(WireValue::Unit)
}

pub(super) fn do_compile(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    let a = Args::new(args, 4)?;
    let instance = iso.table.resolve::<CompilerInstance>(a.handle(0)?)?;
    instance.ensure_active()?;

    // Local context for the duration of this call, closed on every exit
    // path.
    let _scope = iso.contexts.enter_local()?;

    let releaser = iso.port.releaser()?;
    let compilable = CompilableProxy::new(
        HandleRef::new(a.handle(2)?, releaser.clone())?,
        iso.port.clone(),
    );
    let task = match a.opt_handle(1)? {
        Some(handle) => Some(TaskProxy::new(
            HandleRef::new(handle, releaser.clone())?,
            iso.port.clone(),
        )),
        None => None,
    };
    let listener = match a.opt_handle(3)? {
        Some(handle) => Some(ListenerProxy::new(
            HandleRef::new(handle, releaser)?,
            iso.port.clone(),
        )),
        None => None,
    };

    let request = CompileRequest {
        compilable: &compilable,
        task: task.as_ref().map(|t| t as &dyn CompilationTask),
        listener: listener.as_ref().map(|l| l as &dyn CompilerListener),
    };
    let outcome = instance.compiler().compile(&*instance, request);

    match outcome {
        Ok(info) => {
            if let Some(listener) = &listener {
                listener.on_success(&info)?;
            }
            Ok(WireValue::Unit)
        }
        Err(CompileError::Bailout(bailout)) => {
            if let Some(listener) = &listener {
                let detail = failure_detail(iso, bailout.reason.clone())?;
                listener.on_failure(
                    &bailout.reason,
                    true,
                    bailout.permanent,
                    bailout.tier,
                    Some(detail),
                )?;
            }
            compilable.on_compilation_failed(&bailout.reason, true, bailout.permanent)?;
            // A bailout is an outcome, not a fault: the call completes.
            Ok(WireValue::Unit)
        }
        Err(CompileError::Fault(fault)) => {
            let message = fault.to_string();
            if let Some(listener) = &listener {
                let detail = failure_detail(iso, message.clone())?;
                listener.on_failure(&message, false, false, CompilationTier::Ir, Some(detail))?;
            }
            compilable.on_compilation_failed(&message, false, false)?;
            Err(fault)
        }
    }
}

/// Export a lazy diagnostic supplier for a failed compile. Only called
/// when a listener is present — the no-listener path never pays for it.
fn failure_detail(iso: &Arc<CompilerIsolate>, reason: String) -> BridgeResult<FailureDetail> {
    let supplier = Arc::new(DiagnosticSupplier::new(move || {
        format!("compilation failed: {reason}")
    }));
    let handle = iso.table.export(supplier);
    let href = HandleRef::new(
        handle,
        Arc::new(LocalReleaser {
            table: iso.table.clone(),
        }),
    )?;
    let fetch = {
        let iso = iso.clone();
        Arc::new(move |args: &[WireValue]| {
            get_supplied_string(&iso, args).map_err(|fault| to_envelope(&fault))
        }) as tarn_bridge_abi::OperationTarget
    };
    Ok(FailureDetail::new(href, fetch))
}

pub(super) fn shutdown(iso: &Arc<CompilerIsolate>, args: &[WireValue]) -> BridgeResult<WireValue> {
    let a = Args::new(args, 1)?;
    let instance = iso.table.resolve::<CompilerInstance>(a.handle(0)?)?;
    instance.shutdown()?;
    iso.run_teardown();
    Ok(WireValue::Unit)
}

pub(super) fn install_call_boundary_method(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    let a = Args::new(args, 2)?;
    let instance = iso.table.resolve::<CompilerInstance>(a.handle(0)?)?;
    instance.ensure_active()?;
    instance.install_call_boundary(MethodToken(a.i64(1)? as u64));
    Ok(WireValue::Unit)
}

pub(super) fn install_reserved_slot_method(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    let a = Args::new(args, 2)?;
    let instance = iso.table.resolve::<CompilerInstance>(a.handle(0)?)?;
    instance.ensure_active()?;
    instance.install_reserved_slot(MethodToken(a.i64(1)? as u64));
    Ok(WireValue::Unit)
}

pub(super) fn purge_partial_eval_caches(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    let a = Args::new(args, 1)?;
    let instance = iso.table.resolve::<CompilerInstance>(a.handle(0)?)?;
    instance.ensure_active()?;
    instance.partial_eval_cache().purge();
    Ok(WireValue::Unit)
}

pub(super) fn get_compiler_configuration_name(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    let a = Args::new(args, 1)?;
    let instance = iso.table.resolve::<CompilerInstance>(a.handle(0)?)?;
    instance.ensure_active()?;
    Ok(WireValue::Str(
        instance.compiler().configuration_name().to_string(),
    ))
}

pub(super) fn get_supplied_string(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    let a = Args::new(args, 1)?;
    let supplier = iso.table.resolve::<DiagnosticSupplier>(a.handle(0)?)?;
    Ok(WireValue::Str(supplier.get().to_string()))
}

pub(super) fn release_handle(
    iso: &Arc<CompilerIsolate>,
    args: &[WireValue],
) -> BridgeResult<WireValue> {
    let a = Args::new(args, 1)?;
    iso.table.release(a.handle(0)?)?;
    Ok(WireValue::Unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_diagnostic_supplier_materializes_once_on_read() {
        let computed = Arc::new(AtomicUsize::new(0));
        let supplier = {
            let computed = computed.clone();
            DiagnosticSupplier::new(move || {
                computed.fetch_add(1, Ordering::SeqCst);
                "details".to_string()
            })
        };

        assert!(!supplier.is_materialized());
        assert_eq!(computed.load(Ordering::SeqCst), 0);

        assert_eq!(supplier.get(), "details");
        assert_eq!(supplier.get(), "details");
        assert_eq!(computed.load(Ordering::SeqCst), 1);
    }
}
