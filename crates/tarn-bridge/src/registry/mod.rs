//! Operation registries — one-time resolution of closed operation sets
//!
//! A registry binds a closed, enumerable set of operation ids to
//! invocable targets discovered on a `DispatchSurface`, exactly once.
//! Construction fails loudly — naming *every* unmatched id, or the
//! name bound more than once — and a successfully frozen table is
//! immutable and safe for unsynchronized concurrent reads.

mod ops;

pub use ops::{CompilerOp, HostOp};

use std::marker::PhantomData;

use rustc_hash::FxHashMap;
use tarn_bridge_abi::{DispatchSurface, OperationTarget};

/// A member of a closed operation-id set.
///
/// Ids map 1:1 to canonical operation names; `index` is a dense index
/// into the set, used for O(1) frozen-table lookup.
pub trait OperationId: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// Every id in the closed set, in index order.
    fn all() -> &'static [Self];

    /// The canonical operation name this id binds to.
    fn canonical_name(self) -> &'static str;

    /// Dense index of this id within `all()`.
    fn index(self) -> usize;
}

/// Errors constructing an operation registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// One or more ids had no matching operation on the surface.
    /// Carries the complete list of unmatched canonical names.
    #[error("no binding for operations: {}", .0.join(", "))]
    MissingBindings(Vec<&'static str>),

    /// A canonical name matched more than one operation
    #[error("duplicate binding for operation `{0}`")]
    DuplicateBinding(&'static str),
}

/// Immutable id → target table for one direction of the bridge.
pub struct OperationRegistry<I: OperationId> {
    table: Box<[Option<OperationTarget>]>,
    _ids: PhantomData<I>,
}

impl<I: OperationId> std::fmt::Debug for OperationRegistry<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("len", &self.table.len())
            .finish_non_exhaustive()
    }
}

impl<I: OperationId> OperationRegistry<I> {
    /// Resolve the full closed set against a discovery surface.
    pub fn resolve(surface: &dyn DispatchSurface) -> Result<Self, RegistryError> {
        Self::resolve_subset(I::all(), surface)
    }

    /// Resolve a capability's subset of the closed set.
    ///
    /// Used by per-capability lazy tables: each proxy class binds only
    /// the operations it needs. Resolution is pure and deterministic, so
    /// redundant concurrent resolution of the same subset is wasted work
    /// rather than a correctness hazard.
    pub fn resolve_subset(
        ids: &[I],
        surface: &dyn DispatchSurface,
    ) -> Result<Self, RegistryError> {
        let mut by_name: FxHashMap<&str, Vec<OperationTarget>> = FxHashMap::default();
        for op in surface.operations() {
            by_name.entry(op.name).or_default().push(op.target);
        }

        let mut table: Vec<Option<OperationTarget>> = vec![None; I::all().len()];
        let mut missing: Vec<&'static str> = Vec::new();
        for &id in ids {
            let name = id.canonical_name();
            match by_name.get(name).map(|targets| targets.len()).unwrap_or(0) {
                0 => missing.push(name),
                1 => {
                    let target = by_name.get(name).and_then(|t| t.first()).cloned();
                    table[id.index()] = target;
                }
                _ => return Err(RegistryError::DuplicateBinding(name)),
            }
        }
        if !missing.is_empty() {
            return Err(RegistryError::MissingBindings(missing));
        }

        Ok(OperationRegistry {
            table: table.into_boxed_slice(),
            _ids: PhantomData,
        })
    }

    /// Look up the target bound to `id`.
    ///
    /// O(1) on the frozen table and never empty for an id this table was
    /// resolved over. Calling with an id outside the resolved subset is
    /// a programming error, not a runtime contingency.
    pub fn lookup(&self, id: I) -> &OperationTarget {
        self.table[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("operation {id:?} not resolved in this table"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_bridge_abi::{NamedOperation, WireValue};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestOp {
        A,
        B,
        C,
    }

    impl OperationId for TestOp {
        fn all() -> &'static [Self] {
            &[TestOp::A, TestOp::B, TestOp::C]
        }

        fn canonical_name(self) -> &'static str {
            match self {
                TestOp::A => "A",
                TestOp::B => "B",
                TestOp::C => "C",
            }
        }

        fn index(self) -> usize {
            self as usize
        }
    }

    struct FixedSurface(Vec<&'static str>);

    impl DispatchSurface for FixedSurface {
        fn operations(&self) -> Vec<NamedOperation> {
            self.0
                .iter()
                .map(|&name| NamedOperation::new(name, move |_| Ok(WireValue::Str(name.into()))))
                .collect()
        }
    }

    #[test]
    fn test_resolves_iff_every_id_matches_exactly_once() {
        let surface = FixedSurface(vec!["A", "B", "C"]);
        let registry = OperationRegistry::<TestOp>::resolve(&surface).unwrap();
        for &id in TestOp::all() {
            let result = (registry.lookup(id))(&[]).unwrap();
            assert_eq!(result, WireValue::Str(id.canonical_name().into()));
        }
    }

    #[test]
    fn test_missing_ids_reported_completely() {
        // Ids {A, B, C} against a surface exposing {A, B, D}: the error
        // names exactly {C}.
        let surface = FixedSurface(vec!["A", "B", "D"]);
        let err = OperationRegistry::<TestOp>::resolve(&surface).unwrap_err();
        assert_eq!(err, RegistryError::MissingBindings(vec!["C"]));

        // And with several absent the whole set is named, not a prefix.
        let surface = FixedSurface(vec!["B"]);
        let err = OperationRegistry::<TestOp>::resolve(&surface).unwrap_err();
        assert_eq!(err, RegistryError::MissingBindings(vec!["A", "C"]));
    }

    #[test]
    fn test_duplicate_binding_reported() {
        let surface = FixedSurface(vec!["A", "A", "B", "C"]);
        let err = OperationRegistry::<TestOp>::resolve(&surface).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateBinding("A"));
    }

    #[test]
    fn test_subset_resolution() {
        // Surface is missing C, but a subset that never asks for C
        // resolves fine.
        let surface = FixedSurface(vec!["A", "B"]);
        let registry =
            OperationRegistry::<TestOp>::resolve_subset(&[TestOp::A, TestOp::B], &surface)
                .unwrap();
        assert!((registry.lookup(TestOp::A))(&[]).is_ok());
    }

    #[test]
    #[should_panic(expected = "not resolved in this table")]
    fn test_lookup_outside_subset_panics() {
        let surface = FixedSurface(vec!["A", "B"]);
        let registry =
            OperationRegistry::<TestOp>::resolve_subset(&[TestOp::A], &surface).unwrap();
        let _ = registry.lookup(TestOp::B);
    }

    #[test]
    fn test_frozen_table_concurrent_reads() {
        let surface = FixedSurface(vec!["A", "B", "C"]);
        let registry =
            std::sync::Arc::new(OperationRegistry::<TestOp>::resolve(&surface).unwrap());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let registry = registry.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        for &id in TestOp::all() {
                            assert!((registry.lookup(id))(&[]).is_ok());
                        }
                    }
                });
            }
        });
    }
}
