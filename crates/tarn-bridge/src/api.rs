//! Capability contracts and the narrow interfaces of external collaborators
//!
//! The traits here are the seams of the bridge. Host objects implement
//! the capability traits on the host side; the compiler side sees the
//! same traits through proxy adapters and never learns which side of the
//! boundary an object lives on. The optimizing pipeline itself is an
//! external collaborator behind `UnitCompiler`/`CompilerFactory` — the
//! bridge drives it and never reaches into it.

use std::any::Any;
use std::sync::Arc;

use tarn_bridge_abi::convert::result_str;
use tarn_bridge_abi::{OperationTarget, RawHandle, WireValue};

use crate::cache::PartialEvalCache;
use crate::fault::{from_envelope, BridgeResult, RuntimeFault};
use crate::handle::HandleRef;
use crate::options::CompilerOptionsMap;

// ============================================================================
// Tokens and small data types
// ============================================================================

/// Transferable reference to a resolved method. Methods cross the
/// boundary by token, never by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodToken(pub u64);

/// Transferable reference to an optimization assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssumptionToken(pub u64);

/// Transferable reference to a code dependency on an assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyToken(pub u64);

/// Per-method metadata recorded by the install operations and consulted
/// during later compilations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodFlags {
    /// Method is a call boundary
    pub call_boundary: bool,
    /// Method carries a reserved slot
    pub reserved_slot: bool,
}

/// Tier of the compilation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum CompilationTier {
    /// Bytecode-to-IR tier (lifting and IR-level optimization)
    Ir = 1,
    /// Native code generation tier
    Codegen = 2,
}

impl CompilationTier {
    /// Wire form.
    pub fn as_wire(self) -> i32 {
        self as i32
    }

    /// Decode the wire form.
    pub fn from_wire(value: i32) -> BridgeResult<Self> {
        match value {
            1 => Ok(CompilationTier::Ir),
            2 => Ok(CompilationTier::Codegen),
            other => Err(RuntimeFault::Precondition(format!("unknown tier {other}")).into()),
        }
    }
}

/// Snapshot of a compilation graph at a tier boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    /// Number of graph nodes
    pub node_count: u32,
}

/// Result of a successful unit compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnitInfo {
    /// Highest tier the unit reached
    pub tier: CompilationTier,
    /// Emitted code size in bytes
    pub target_code_size: u32,
    /// Total frame size in bytes
    pub total_frame_size: u32,
    /// Final graph shape
    pub graph: GraphStats,
}

/// A could-not-complete compile outcome. Recoverable unless `permanent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bailout {
    /// Human-readable reason
    pub reason: String,
    /// Never retry this compilable when set
    pub permanent: bool,
    /// Tier reached when the compile gave up
    pub tier: CompilationTier,
}

/// Why a unit compilation did not produce code.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The compiler gave up; reported through `on_failure(bailout=true)`
    #[error("bailout: {}", .0.reason)]
    Bailout(Bailout),

    /// A genuine fault; reported through `on_failure(bailout=false)`
    /// and then propagated to the caller
    #[error(transparent)]
    Fault(#[from] crate::fault::BridgeFault),
}

// ============================================================================
// Capability contracts
// ============================================================================

/// A unit of compilation owned by the host runtime.
pub trait Compilable: Send + Sync {
    /// Display name of the unit.
    fn name(&self) -> BridgeResult<String>;

    /// Full string form of the unit.
    fn display_string(&self) -> BridgeResult<String>;

    /// Address of the unit's failed-speculations record.
    fn failed_speculations_address(&self) -> BridgeResult<u64>;

    /// Notification that a compilation of this unit failed.
    fn on_compilation_failed(
        &self,
        reason: &str,
        bailout: bool,
        permanent_bailout: bool,
    ) -> BridgeResult<()>;
}

/// A host-owned compile task carrying the pollable cancellation state.
///
/// There is no interrupt-based cancellation and no built-in timeout;
/// compilers observe cancellation by polling.
pub trait CompilationTask: Send + Sync {
    /// Whether cancellation was requested.
    fn is_cancelled(&self) -> BridgeResult<bool>;

    /// Reason for a requested cancellation, if any.
    fn cancellation_reason(&self) -> BridgeResult<Option<String>>;

    /// Source position of a node in the unit, if known.
    fn position(&self, node_id: u64) -> BridgeResult<Option<Arc<dyn SourcePosition>>>;
}

/// Progress listener for one compilation. All callbacks are one-way,
/// fire-and-acknowledge.
pub trait CompilerListener: Send + Sync {
    /// The IR tier finished.
    fn on_ir_tier_finished(&self, graph: &GraphStats) -> BridgeResult<()>;

    /// The codegen tier finished.
    fn on_codegen_tier_finished(&self, graph: &GraphStats) -> BridgeResult<()>;

    /// The compile is being retried; strictly precedes the terminal
    /// callback.
    fn on_compilation_retry(&self) -> BridgeResult<()>;

    /// Terminal success callback — fires exactly once per compile,
    /// mutually exclusive with `on_failure`.
    fn on_success(&self, result: &CompiledUnitInfo) -> BridgeResult<()>;

    /// Terminal failure callback — fires exactly once per compile,
    /// mutually exclusive with `on_success`. `detail` materializes its
    /// diagnostic string only when asked.
    fn on_failure(
        &self,
        reason: &str,
        bailout: bool,
        permanent_bailout: bool,
        tier: CompilationTier,
        detail: Option<FailureDetail>,
    ) -> BridgeResult<()>;
}

/// The host runtime's compiler-support services.
pub trait CompilerRuntime: Send + Sync {
    /// Log a message through the host runtime.
    fn log(&self, message: &str) -> BridgeResult<()>;

    /// The host's initial compiler options.
    fn initial_options(&self) -> BridgeResult<CompilerOptionsMap>;

    /// Register an optimized assumption; returns the consumer to feed
    /// dependencies to, or `None` if the assumption is already invalid.
    fn register_optimized_assumption(
        &self,
        assumption: AssumptionToken,
    ) -> BridgeResult<Option<Arc<dyn AssumptionConsumer>>>;
}

/// Receiver for code dependencies on one registered assumption.
pub trait AssumptionConsumer: Send + Sync {
    /// Attach a dependency to the assumption.
    fn consume_optimized_assumption_dependency(
        &self,
        dependency: DependencyToken,
    ) -> BridgeResult<()>;
}

/// A source position owned by the host runtime.
pub trait SourcePosition: Send + Sync {
    /// URI of the source.
    fn uri(&self) -> BridgeResult<String>;

    /// 1-based line number.
    fn line_number(&self) -> BridgeResult<i32>;

    /// Start offset in the source text.
    fn offset_start(&self) -> BridgeResult<i32>;

    /// End offset in the source text.
    fn offset_end(&self) -> BridgeResult<i32>;
}

// ============================================================================
// Lazily materialized failure diagnostics
// ============================================================================

/// Handle on a lazily materialized failure diagnostic.
///
/// Created only when a listener is present; the diagnostic string is
/// computed on the first `text` call, not at failure time.
pub struct FailureDetail {
    href: HandleRef,
    fetch: OperationTarget,
}

impl FailureDetail {
    pub(crate) fn new(href: HandleRef, fetch: OperationTarget) -> Self {
        FailureDetail { href, fetch }
    }

    /// Materialize the diagnostic string.
    pub fn text(&self) -> BridgeResult<String> {
        let result = (self.fetch)(&[WireValue::Handle(self.href.raw())])
            .map_err(from_envelope)?;
        result_str(result).map_err(|e| RuntimeFault::Marshal(e).into())
    }

    /// Transfer ownership of the underlying supplier reference across
    /// the boundary.
    pub(crate) fn into_raw(self) -> RawHandle {
        self.href.into_raw()
    }
}

impl std::fmt::Debug for FailureDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureDetail").finish_non_exhaustive()
    }
}

// ============================================================================
// External collaborator: the optimizing pipeline
// ============================================================================

/// What the bridge offers a running compilation.
pub trait CompileEnv: Send + Sync {
    /// Metadata recorded for a method by the install operations.
    fn method_flags(&self, method: MethodToken) -> MethodFlags;

    /// The purgeable partial-evaluation cache.
    fn partial_eval_cache(&self) -> &PartialEvalCache;

    /// The host runtime's compiler-support services.
    fn runtime(&self) -> &dyn CompilerRuntime;

    /// Translate a boxed VM constant, valid only inside an open
    /// compilation context.
    fn translate_constant(&self, handle: RawHandle)
        -> BridgeResult<Arc<dyn Any + Send + Sync>>;
}

/// One compile request, confined to the calling thread.
pub struct CompileRequest<'a> {
    /// The unit to compile
    pub compilable: &'a dyn Compilable,
    /// Cancellation state; absent means unconditional and
    /// non-cancellable
    pub task: Option<&'a dyn CompilationTask>,
    /// Progress listener; absent means no callbacks
    pub listener: Option<&'a dyn CompilerListener>,
}

/// The optimizing pipeline, consumed as an opaque service.
///
/// Implementations emit tier-finished and retry callbacks through the
/// request's listener; the bridge itself emits the terminal callback
/// from the returned outcome.
pub trait UnitCompiler: Send + Sync {
    /// Name of the active compiler configuration.
    fn configuration_name(&self) -> &str;

    /// First-use initialization against a specific compilable.
    fn initialize(
        &self,
        compilable: &dyn Compilable,
        options: &CompilerOptionsMap,
    ) -> BridgeResult<()>;

    /// Compile one unit.
    fn compile(
        &self,
        env: &dyn CompileEnv,
        request: CompileRequest<'_>,
    ) -> Result<CompiledUnitInfo, CompileError>;

    /// Release compiler resources.
    fn shutdown(&self) -> BridgeResult<()>;
}

/// Builds the optimizer for one isolate.
pub trait CompilerFactory: Send + Sync {
    /// Create a compiler bound to the given runtime services.
    fn create(&self, runtime: Arc<dyn CompilerRuntime>) -> BridgeResult<Arc<dyn UnitCompiler>>;
}
