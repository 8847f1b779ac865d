//! HostSurface — the operations the host runtime exposes to the compiler
//!
//! Every operation resolves its receiver from the host handle table,
//! calls the real capability object, and marshals the result. Faults are
//! translated into envelopes at this seam; nothing panics across it.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tarn_bridge_abi::{
    Args, DispatchSurface, NamedOperation, OperationTarget, RawHandle, WireValue,
};

use crate::api::{
    AssumptionConsumer, AssumptionToken, CompilationTask, CompilationTier, Compilable,
    CompiledUnitInfo, CompilerListener, CompilerRuntime, DependencyToken, FailureDetail,
    GraphStats, SourcePosition,
};
use crate::fault::{to_envelope, BridgeFault, BridgeResult, RuntimeFault};
use crate::handle::{HandleRef, HandleReleaser, HandleTable};
use crate::port::RemoteReleaser;
use crate::registry::{CompilerOp, HostOp, OperationId, OperationRegistry};

/// A host capability object exported to the compiler runtime.
pub enum HostObject {
    /// A compilable unit
    Compilable(Arc<dyn Compilable>),
    /// A compile task
    Task(Arc<dyn CompilationTask>),
    /// A compiler listener
    Listener(Arc<dyn CompilerListener>),
    /// The host runtime's compiler-support services
    Runtime(Arc<dyn CompilerRuntime>),
    /// A source position
    Position(Arc<dyn SourcePosition>),
    /// An assumption-dependency consumer
    Consumer(Arc<dyn AssumptionConsumer>),
}

impl HostObject {
    fn kind(&self) -> &'static str {
        match self {
            HostObject::Compilable(_) => "compilable",
            HostObject::Task(_) => "task",
            HostObject::Listener(_) => "listener",
            HostObject::Runtime(_) => "runtime",
            HostObject::Position(_) => "position",
            HostObject::Consumer(_) => "consumer",
        }
    }

    fn mismatch(&self, expected: &'static str) -> BridgeFault {
        RuntimeFault::TypeMismatch {
            expected,
            got: self.kind().to_string(),
        }
        .into()
    }

    fn as_compilable(&self) -> BridgeResult<&Arc<dyn Compilable>> {
        match self {
            HostObject::Compilable(c) => Ok(c),
            other => Err(other.mismatch("compilable")),
        }
    }

    fn as_task(&self) -> BridgeResult<&Arc<dyn CompilationTask>> {
        match self {
            HostObject::Task(t) => Ok(t),
            other => Err(other.mismatch("task")),
        }
    }

    fn as_listener(&self) -> BridgeResult<&Arc<dyn CompilerListener>> {
        match self {
            HostObject::Listener(l) => Ok(l),
            other => Err(other.mismatch("listener")),
        }
    }

    fn as_runtime(&self) -> BridgeResult<&Arc<dyn CompilerRuntime>> {
        match self {
            HostObject::Runtime(r) => Ok(r),
            other => Err(other.mismatch("runtime")),
        }
    }

    fn as_position(&self) -> BridgeResult<&Arc<dyn SourcePosition>> {
        match self {
            HostObject::Position(p) => Ok(p),
            other => Err(other.mismatch("position")),
        }
    }

    fn as_consumer(&self) -> BridgeResult<&Arc<dyn AssumptionConsumer>> {
        match self {
            HostObject::Consumer(c) => Ok(c),
            other => Err(other.mismatch("consumer")),
        }
    }
}

/// Host-side grip on the compiler surface, attached after the lookup
/// exchange: the lazy-diagnostic fetch target and the releaser for
/// compiler-heap handles.
struct CompilerLink {
    supplied_string: OperationTarget,
    releaser: Arc<dyn HandleReleaser>,
}

/// The host runtime's dispatch surface.
pub struct HostSurface {
    table: Arc<HandleTable>,
    compiler: Arc<OnceCell<CompilerLink>>,
}

impl HostSurface {
    /// Create an empty host surface.
    pub fn new() -> Arc<Self> {
        Arc::new(HostSurface {
            table: Arc::new(HandleTable::new()),
            compiler: Arc::new(OnceCell::new()),
        })
    }

    /// Number of live host-heap handles (diagnostics and tests).
    pub fn handle_count(&self) -> usize {
        self.table.len()
    }

    pub(crate) fn table(&self) -> &Arc<HandleTable> {
        &self.table
    }

    pub(crate) fn export(&self, object: HostObject) -> RawHandle {
        self.table.export(Arc::new(object))
    }

    pub(crate) fn attach_compiler(
        &self,
        registry: &OperationRegistry<CompilerOp>,
    ) -> BridgeResult<()> {
        let link = CompilerLink {
            supplied_string: registry.lookup(CompilerOp::GetSuppliedString).clone(),
            releaser: Arc::new(RemoteReleaser::new(
                registry.lookup(CompilerOp::ReleaseHandle).clone(),
            )),
        };
        self.compiler
            .set(link)
            .map_err(|_| BridgeFault::illegal_state("compiler link already attached"))
    }
}

fn host_op(
    name: &'static str,
    f: impl Fn(&[WireValue]) -> BridgeResult<WireValue> + Send + Sync + 'static,
) -> NamedOperation {
    NamedOperation::new(name, move |args| {
        tracing::trace!(op = name, "host entry");
        f(args).map_err(|fault| to_envelope(&fault))
    })
}

impl DispatchSurface for HostSurface {
    fn operations(&self) -> Vec<NamedOperation> {
        let mut ops = Vec::with_capacity(HostOp::all().len());

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::GetCompilableName.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                Ok(WireValue::Str(object.as_compilable()?.name()?))
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::CompilableToString.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                Ok(WireValue::Str(object.as_compilable()?.display_string()?))
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::GetFailedSpeculationsAddress.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                let address = object.as_compilable()?.failed_speculations_address()?;
                Ok(WireValue::I64(address as i64))
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::OnCompilationFailed.canonical_name(),
            move |args| {
                let a = Args::new(args, 4)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                object
                    .as_compilable()?
                    .on_compilation_failed(a.str(1)?, a.bool(2)?, a.bool(3)?)?;
                Ok(WireValue::Unit)
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(HostOp::IsCancelled.canonical_name(), move |args| {
            let a = Args::new(args, 1)?;
            let object = table.resolve::<HostObject>(a.handle(0)?)?;
            Ok(WireValue::Bool(object.as_task()?.is_cancelled()?))
        }));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::GetCancellationReason.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                Ok(WireValue::opt_str(object.as_task()?.cancellation_reason()?))
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(HostOp::GetPosition.canonical_name(), move |args| {
            let a = Args::new(args, 2)?;
            let object = table.resolve::<HostObject>(a.handle(0)?)?;
            let position = object.as_task()?.position(a.i64(1)? as u64)?;
            Ok(WireValue::opt_handle(position.map(|p| {
                // A new host object crosses over: export it for the
                // compiler side to wrap.
                table.export(Arc::new(HostObject::Position(p)))
            })))
        }));

        let table = self.table.clone();
        ops.push(host_op(HostOp::OnSuccess.canonical_name(), move |args| {
            let a = Args::new(args, 5)?;
            let object = table.resolve::<HostObject>(a.handle(0)?)?;
            let result = CompiledUnitInfo {
                tier: CompilationTier::from_wire(a.i32(1)?)?,
                target_code_size: a.i32(2)? as u32,
                total_frame_size: a.i32(3)? as u32,
                graph: GraphStats {
                    node_count: a.i32(4)? as u32,
                },
            };
            object.as_listener()?.on_success(&result)?;
            Ok(WireValue::Unit)
        }));

        let table = self.table.clone();
        let compiler = self.compiler.clone();
        ops.push(host_op(HostOp::OnFailure.canonical_name(), move |args| {
            let a = Args::new(args, 6)?;
            let object = table.resolve::<HostObject>(a.handle(0)?)?;
            let detail = match a.opt_handle(5)? {
                Some(handle) => {
                    let link = compiler.get().ok_or_else(|| {
                        BridgeFault::illegal_state("compiler link not attached")
                    })?;
                    // The supplier reference crossed into this heap with
                    // the callback; ownership lands here.
                    Some(FailureDetail::new(
                        HandleRef::new(handle, link.releaser.clone())?,
                        link.supplied_string.clone(),
                    ))
                }
                None => None,
            };
            object.as_listener()?.on_failure(
                a.str(1)?,
                a.bool(2)?,
                a.bool(3)?,
                CompilationTier::from_wire(a.i32(4)?)?,
                detail,
            )?;
            Ok(WireValue::Unit)
        }));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::OnCompilationRetry.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                object.as_listener()?.on_compilation_retry()?;
                Ok(WireValue::Unit)
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::OnIrTierFinished.canonical_name(),
            move |args| {
                let a = Args::new(args, 2)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                let graph = GraphStats {
                    node_count: a.i32(1)? as u32,
                };
                object.as_listener()?.on_ir_tier_finished(&graph)?;
                Ok(WireValue::Unit)
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::OnCodegenTierFinished.canonical_name(),
            move |args| {
                let a = Args::new(args, 2)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                let graph = GraphStats {
                    node_count: a.i32(1)? as u32,
                };
                object.as_listener()?.on_codegen_tier_finished(&graph)?;
                Ok(WireValue::Unit)
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(HostOp::Log.canonical_name(), move |args| {
            let a = Args::new(args, 2)?;
            let object = table.resolve::<HostObject>(a.handle(0)?)?;
            object.as_runtime()?.log(a.str(1)?)?;
            Ok(WireValue::Unit)
        }));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::GetInitialOptions.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                let options = object.as_runtime()?.initial_options()?;
                Ok(WireValue::Bytes(options.encode()?))
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::RegisterOptimizedAssumption.canonical_name(),
            move |args| {
                let a = Args::new(args, 2)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                let consumer = object
                    .as_runtime()?
                    .register_optimized_assumption(AssumptionToken(a.i64(1)? as u64))?;
                Ok(WireValue::opt_handle(consumer.map(|c| {
                    table.export(Arc::new(HostObject::Consumer(c)))
                })))
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::ConsumeOptimizedAssumptionDependency.canonical_name(),
            move |args| {
                let a = Args::new(args, 2)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                object
                    .as_consumer()?
                    .consume_optimized_assumption_dependency(DependencyToken(a.i64(1)? as u64))?;
                Ok(WireValue::Unit)
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(HostOp::GetUri.canonical_name(), move |args| {
            let a = Args::new(args, 1)?;
            let object = table.resolve::<HostObject>(a.handle(0)?)?;
            Ok(WireValue::Str(object.as_position()?.uri()?))
        }));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::GetLineNumber.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                Ok(WireValue::I32(object.as_position()?.line_number()?))
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::GetOffsetStart.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                Ok(WireValue::I32(object.as_position()?.offset_start()?))
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::GetOffsetEnd.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                let object = table.resolve::<HostObject>(a.handle(0)?)?;
                Ok(WireValue::I32(object.as_position()?.offset_end()?))
            },
        ));

        let table = self.table.clone();
        ops.push(host_op(
            HostOp::ReleaseHandle.canonical_name(),
            move |args| {
                let a = Args::new(args, 1)?;
                table.release(a.handle(0)?)?;
                Ok(WireValue::Unit)
            },
        ));

        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_covers_every_host_op() {
        let surface = HostSurface::new();
        let names: Vec<&str> = surface.operations().iter().map(|op| op.name).collect();
        for &op in HostOp::all() {
            assert!(
                names.contains(&op.canonical_name()),
                "surface is missing {:?}",
                op
            );
        }
        assert_eq!(names.len(), HostOp::all().len());
    }

    #[test]
    fn test_capability_mismatch_is_structured() {
        struct Pos;
        impl SourcePosition for Pos {
            fn uri(&self) -> BridgeResult<String> {
                Ok("src://x".into())
            }
            fn line_number(&self) -> BridgeResult<i32> {
                Ok(1)
            }
            fn offset_start(&self) -> BridgeResult<i32> {
                Ok(0)
            }
            fn offset_end(&self) -> BridgeResult<i32> {
                Ok(0)
            }
        }

        let surface = HostSurface::new();
        let handle = surface.export(HostObject::Position(Arc::new(Pos)));

        // Asking the position to act as a compilable is a mismatch
        // fault, reported through the envelope.
        let ops = surface.operations();
        let name_op = ops
            .iter()
            .find(|op| op.name == HostOp::GetCompilableName.canonical_name())
            .unwrap();
        let envelope = (name_op.target)(&[WireValue::Handle(handle)]).unwrap_err();
        assert!(envelope.message.contains("type mismatch"), "{envelope:?}");
    }
}
