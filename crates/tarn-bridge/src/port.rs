//! HostPort — the compiler side's connection to the host surface
//!
//! Installed once during the bootstrap lookup exchange. Each proxy
//! capability resolves its own operation subset lazily on first use;
//! resolution is pure, so concurrent first uses at worst duplicate work.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tarn_bridge_abi::convert::result_unit;
use tarn_bridge_abi::{DispatchSurface, OperationTarget, RawHandle, WireValue};

use crate::fault::{from_envelope, BridgeFault, BridgeResult, RuntimeFault};
use crate::handle::HandleReleaser;
use crate::registry::{HostOp, OperationRegistry};

/// Remote releaser backed by a surface's `ReleaseHandle` target.
pub(crate) struct RemoteReleaser {
    target: OperationTarget,
}

impl RemoteReleaser {
    pub(crate) fn new(target: OperationTarget) -> Self {
        RemoteReleaser { target }
    }
}

impl HandleReleaser for RemoteReleaser {
    fn release(&self, handle: RawHandle) -> BridgeResult<()> {
        let result = (self.target)(&[WireValue::Handle(handle)]).map_err(from_envelope)?;
        result_unit(result)?;
        Ok(())
    }
}

/// Invoke a bound target, funneling a translated fault back through the
/// exception bridge.
pub(crate) fn invoke(target: &OperationTarget, args: &[WireValue]) -> BridgeResult<WireValue> {
    (target)(args).map_err(from_envelope)
}

macro_rules! calls_struct {
    ($name:ident { $($field:ident => $op:expr),+ $(,)? }) => {
        pub(crate) struct $name {
            $(pub(crate) $field: OperationTarget,)+
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        impl $name {
            fn resolve(surface: &dyn DispatchSurface) -> BridgeResult<Self> {
                let registry = OperationRegistry::<HostOp>::resolve_subset(
                    &[$($op),+],
                    surface,
                )
                .map_err(RuntimeFault::Registry)?;
                Ok($name {
                    $($field: registry.lookup($op).clone(),)+
                })
            }
        }
    };
}

calls_struct!(CompilableCalls {
    name => HostOp::GetCompilableName,
    to_string => HostOp::CompilableToString,
    failed_speculations_address => HostOp::GetFailedSpeculationsAddress,
    on_compilation_failed => HostOp::OnCompilationFailed,
});

calls_struct!(TaskCalls {
    is_cancelled => HostOp::IsCancelled,
    cancellation_reason => HostOp::GetCancellationReason,
    position => HostOp::GetPosition,
});

calls_struct!(ListenerCalls {
    on_ir_tier_finished => HostOp::OnIrTierFinished,
    on_codegen_tier_finished => HostOp::OnCodegenTierFinished,
    on_compilation_retry => HostOp::OnCompilationRetry,
    on_success => HostOp::OnSuccess,
    on_failure => HostOp::OnFailure,
});

calls_struct!(RuntimeCalls {
    log => HostOp::Log,
    initial_options => HostOp::GetInitialOptions,
    register_optimized_assumption => HostOp::RegisterOptimizedAssumption,
});

calls_struct!(PositionCalls {
    uri => HostOp::GetUri,
    line_number => HostOp::GetLineNumber,
    offset_start => HostOp::GetOffsetStart,
    offset_end => HostOp::GetOffsetEnd,
});

calls_struct!(ConsumerCalls {
    consume => HostOp::ConsumeOptimizedAssumptionDependency,
});

/// The compiler side's view of the host dispatch surface.
pub struct HostPort {
    surface: OnceCell<Arc<dyn DispatchSurface>>,
    compilable: OnceCell<CompilableCalls>,
    task: OnceCell<TaskCalls>,
    listener: OnceCell<ListenerCalls>,
    runtime: OnceCell<RuntimeCalls>,
    position: OnceCell<PositionCalls>,
    consumer: OnceCell<ConsumerCalls>,
    releaser: OnceCell<Arc<dyn HandleReleaser>>,
}

impl HostPort {
    pub(crate) fn new() -> Self {
        HostPort {
            surface: OnceCell::new(),
            compilable: OnceCell::new(),
            task: OnceCell::new(),
            listener: OnceCell::new(),
            runtime: OnceCell::new(),
            position: OnceCell::new(),
            consumer: OnceCell::new(),
            releaser: OnceCell::new(),
        }
    }

    /// Install the host surface during the lookup exchange.
    pub(crate) fn install(&self, surface: Arc<dyn DispatchSurface>) -> BridgeResult<()> {
        self.surface
            .set(surface)
            .map_err(|_| BridgeFault::illegal_state("host surface already installed"))
    }

    fn surface(&self) -> BridgeResult<&Arc<dyn DispatchSurface>> {
        self.surface.get().ok_or_else(|| {
            BridgeFault::illegal_state("host surface not installed; run the lookup exchange first")
        })
    }

    /// Releaser issuing the host's `ReleaseHandle` operation.
    pub(crate) fn releaser(&self) -> BridgeResult<Arc<dyn HandleReleaser>> {
        self.releaser
            .get_or_try_init(|| {
                let surface = self.surface()?;
                let registry = OperationRegistry::<HostOp>::resolve_subset(
                    &[HostOp::ReleaseHandle],
                    surface.as_ref(),
                )
                .map_err(RuntimeFault::Registry)?;
                let target = registry.lookup(HostOp::ReleaseHandle).clone();
                Ok(Arc::new(RemoteReleaser::new(target)) as Arc<dyn HandleReleaser>)
            })
            .cloned()
    }

    pub(crate) fn compilable_calls(&self) -> BridgeResult<&CompilableCalls> {
        self.compilable
            .get_or_try_init(|| CompilableCalls::resolve(self.surface()?.as_ref()))
    }

    pub(crate) fn task_calls(&self) -> BridgeResult<&TaskCalls> {
        self.task
            .get_or_try_init(|| TaskCalls::resolve(self.surface()?.as_ref()))
    }

    pub(crate) fn listener_calls(&self) -> BridgeResult<&ListenerCalls> {
        self.listener
            .get_or_try_init(|| ListenerCalls::resolve(self.surface()?.as_ref()))
    }

    pub(crate) fn runtime_calls(&self) -> BridgeResult<&RuntimeCalls> {
        self.runtime
            .get_or_try_init(|| RuntimeCalls::resolve(self.surface()?.as_ref()))
    }

    pub(crate) fn position_calls(&self) -> BridgeResult<&PositionCalls> {
        self.position
            .get_or_try_init(|| PositionCalls::resolve(self.surface()?.as_ref()))
    }

    pub(crate) fn consumer_calls(&self) -> BridgeResult<&ConsumerCalls> {
        self.consumer
            .get_or_try_init(|| ConsumerCalls::resolve(self.surface()?.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_bridge_abi::NamedOperation;

    struct EmptySurface;

    impl DispatchSurface for EmptySurface {
        fn operations(&self) -> Vec<NamedOperation> {
            Vec::new()
        }
    }

    #[test]
    fn test_calls_before_install_fault() {
        let port = HostPort::new();
        assert!(port.compilable_calls().is_err());
        assert!(port.releaser().is_err());
    }

    #[test]
    fn test_install_twice_faults() {
        let port = HostPort::new();
        port.install(Arc::new(EmptySurface)).unwrap();
        assert!(port.install(Arc::new(EmptySurface)).is_err());
    }

    #[test]
    fn test_missing_capability_ops_reported() {
        let port = HostPort::new();
        port.install(Arc::new(EmptySurface)).unwrap();
        let err = port.task_calls().unwrap_err();
        let message = err.to_string();
        // Every op of the capability is named, not just the first.
        assert!(message.contains("IsCancelled"), "{message}");
        assert!(message.contains("GetCancellationReason"), "{message}");
        assert!(message.contains("GetPosition"), "{message}");
    }
}
