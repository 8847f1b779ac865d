//! The two closed operation-id sets of the bridge
//!
//! `CompilerOp` names what the compiler runtime exposes to the host;
//! `HostOp` names what the host runtime exposes to the compiler. Both
//! sets are closed: every id binds to exactly one canonical name, and a
//! test below asserts totality and uniqueness in place of any runtime
//! discovery.

use super::OperationId;

/// Operations the compiler runtime exposes to the host (host → compiler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerOp {
    /// Build the compiler-side runtime proxy from a supplied host handle
    InitializeRuntime,
    /// Build an optimizer bound to a runtime proxy
    NewCompiler,
    /// First-use initialization of a compiler against a compilable
    InitializeCompiler,
    /// Compile one unit (the core call)
    DoCompile,
    /// Release compiler resources; a second call is a caller error
    Shutdown,
    /// Record call-boundary metadata for a resolved method
    InstallCallBoundaryMethod,
    /// Record reserved-slot metadata for a resolved method
    InstallReservedSlotMethod,
    /// Clear partial-evaluation memoization
    PurgePartialEvalCaches,
    /// Name of the active compiler configuration
    GetCompilerConfigurationName,
    /// Materialize a lazily supplied diagnostic string
    GetSuppliedString,
    /// Delete one reference on a compiler-heap handle
    ReleaseHandle,
}

impl OperationId for CompilerOp {
    fn all() -> &'static [Self] {
        use CompilerOp::*;
        &[
            InitializeRuntime,
            NewCompiler,
            InitializeCompiler,
            DoCompile,
            Shutdown,
            InstallCallBoundaryMethod,
            InstallReservedSlotMethod,
            PurgePartialEvalCaches,
            GetCompilerConfigurationName,
            GetSuppliedString,
            ReleaseHandle,
        ]
    }

    fn canonical_name(self) -> &'static str {
        match self {
            CompilerOp::InitializeRuntime => "InitializeRuntime",
            CompilerOp::NewCompiler => "NewCompiler",
            CompilerOp::InitializeCompiler => "InitializeCompiler",
            CompilerOp::DoCompile => "DoCompile",
            CompilerOp::Shutdown => "Shutdown",
            CompilerOp::InstallCallBoundaryMethod => "InstallCallBoundaryMethod",
            CompilerOp::InstallReservedSlotMethod => "InstallReservedSlotMethod",
            CompilerOp::PurgePartialEvalCaches => "PurgePartialEvalCaches",
            CompilerOp::GetCompilerConfigurationName => "GetCompilerConfigurationName",
            CompilerOp::GetSuppliedString => "GetSuppliedString",
            CompilerOp::ReleaseHandle => "ReleaseHandle",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Operations the host runtime exposes to the compiler (compiler → host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    /// Display name of a compilable
    GetCompilableName,
    /// Full string form of a compilable
    CompilableToString,
    /// Address of a compilable's failed-speculations record
    GetFailedSpeculationsAddress,
    /// Tell a compilable its compilation failed
    OnCompilationFailed,
    /// Poll a task's cancellation flag
    IsCancelled,
    /// Poll a task's cancellation reason
    GetCancellationReason,
    /// Source position of a node within a task's unit
    GetPosition,
    /// Terminal success callback
    OnSuccess,
    /// Terminal failure callback
    OnFailure,
    /// Non-terminal retry notification
    OnCompilationRetry,
    /// IR tier of the pipeline finished
    OnIrTierFinished,
    /// Codegen tier of the pipeline finished
    OnCodegenTierFinished,
    /// Log a message through the host runtime
    Log,
    /// Host runtime's initial option map (encoded)
    GetInitialOptions,
    /// Register an optimized assumption; yields a dependency consumer
    RegisterOptimizedAssumption,
    /// Hand a dependency to an assumption consumer
    ConsumeOptimizedAssumptionDependency,
    /// URI of a source position
    GetUri,
    /// Line number of a source position
    GetLineNumber,
    /// Start offset of a source position
    GetOffsetStart,
    /// End offset of a source position
    GetOffsetEnd,
    /// Delete one reference on a host-heap handle
    ReleaseHandle,
}

impl OperationId for HostOp {
    fn all() -> &'static [Self] {
        use HostOp::*;
        &[
            GetCompilableName,
            CompilableToString,
            GetFailedSpeculationsAddress,
            OnCompilationFailed,
            IsCancelled,
            GetCancellationReason,
            GetPosition,
            OnSuccess,
            OnFailure,
            OnCompilationRetry,
            OnIrTierFinished,
            OnCodegenTierFinished,
            Log,
            GetInitialOptions,
            RegisterOptimizedAssumption,
            ConsumeOptimizedAssumptionDependency,
            GetUri,
            GetLineNumber,
            GetOffsetStart,
            GetOffsetEnd,
            ReleaseHandle,
        ]
    }

    fn canonical_name(self) -> &'static str {
        match self {
            HostOp::GetCompilableName => "GetCompilableName",
            HostOp::CompilableToString => "CompilableToString",
            HostOp::GetFailedSpeculationsAddress => "GetFailedSpeculationsAddress",
            HostOp::OnCompilationFailed => "OnCompilationFailed",
            HostOp::IsCancelled => "IsCancelled",
            HostOp::GetCancellationReason => "GetCancellationReason",
            HostOp::GetPosition => "GetPosition",
            HostOp::OnSuccess => "OnSuccess",
            HostOp::OnFailure => "OnFailure",
            HostOp::OnCompilationRetry => "OnCompilationRetry",
            HostOp::OnIrTierFinished => "OnIrTierFinished",
            HostOp::OnCodegenTierFinished => "OnCodegenTierFinished",
            HostOp::Log => "Log",
            HostOp::GetInitialOptions => "GetInitialOptions",
            HostOp::RegisterOptimizedAssumption => "RegisterOptimizedAssumption",
            HostOp::ConsumeOptimizedAssumptionDependency => {
                "ConsumeOptimizedAssumptionDependency"
            }
            HostOp::GetUri => "GetUri",
            HostOp::GetLineNumber => "GetLineNumber",
            HostOp::GetOffsetStart => "GetOffsetStart",
            HostOp::GetOffsetEnd => "GetOffsetEnd",
            HostOp::ReleaseHandle => "ReleaseHandle",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_closed_set<I: OperationId>() {
        let all = I::all();
        let mut names = HashSet::new();
        for (expected_index, &id) in all.iter().enumerate() {
            // Dense, in-order indexing.
            assert_eq!(id.index(), expected_index, "index gap at {id:?}");
            // 1:1 canonical naming.
            assert!(
                names.insert(id.canonical_name()),
                "duplicate canonical name {:?}",
                id.canonical_name()
            );
        }
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_compiler_ops_total_and_unique() {
        assert_closed_set::<CompilerOp>();
        assert_eq!(CompilerOp::all().len(), 11);
    }

    #[test]
    fn test_host_ops_total_and_unique() {
        assert_closed_set::<HostOp>();
        assert_eq!(HostOp::all().len(), 21);
    }

    #[test]
    fn test_release_is_present_on_both_surfaces() {
        assert_eq!(CompilerOp::ReleaseHandle.canonical_name(), "ReleaseHandle");
        assert_eq!(HostOp::ReleaseHandle.canonical_name(), "ReleaseHandle");
    }
}
