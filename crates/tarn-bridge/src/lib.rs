//! Tarn compiler-isolation bridge
//!
//! This crate lets the tarn host runtime (owning live compilation
//! inputs) and the optimizing compiler runtime (a possibly separately
//! built, isolated heap) invoke operations on each other's objects
//! through opaque handles:
//! - **Handles**: per-heap tables pinning exported objects, and
//!   `HandleRef`, the exclusive owner of one remote reference (`handle`)
//! - **Registries**: one-time-resolved, immutable operation tables over
//!   an enumerable dispatch surface (`registry`)
//! - **Proxies**: per-capability adapters forwarding every call through
//!   a resolved table (`proxy`)
//! - **Entry points**: the operation surface the compiler runtime
//!   exposes to drive a compile lifecycle (`isolate`)
//! - **Host gateway**: the host-side counterpart driving that surface
//!   (`host`)
//! - **Exception bridge**: fault normalization in both directions
//!   (`fault`)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod cache;
pub mod context;
pub mod fault;
pub mod handle;
pub mod host;
pub mod isolate;
pub mod options;
pub mod port;
pub mod proxy;
pub mod registry;

pub use api::{
    AssumptionConsumer, AssumptionToken, Bailout, CompilationTier, Compilable, CompilationTask,
    CompileEnv, CompileError, CompileRequest, CompiledUnitInfo, CompilerFactory, CompilerListener,
    CompilerRuntime, DependencyToken, FailureDetail, GraphStats, MethodFlags, MethodToken,
    SourcePosition, UnitCompiler,
};
pub use cache::PartialEvalCache;
pub use fault::{BridgeFault, BridgeResult, FatalFault, RuntimeFault};
pub use handle::{HandleRef, HandleReleaser, HandleTable};
pub use host::{initialize_lookup, CompilerGateway, CompilerHandle, HostObject, HostSurface, RuntimeHandle};
pub use isolate::CompilerIsolate;
pub use options::{CompilerOptionsMap, OptionValue};
pub use registry::{CompilerOp, HostOp, OperationId, OperationRegistry, RegistryError};
