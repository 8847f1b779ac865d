//! Dispatch surfaces — the enumerable operation sets a side exposes
//!
//! Each side of the boundary publishes its callable operations as a flat
//! list of `NamedOperation`s. The other side resolves its closed
//! operation-id set against this list exactly once (see the bridge's
//! `OperationRegistry`) and thereafter calls only resolved targets.

use std::sync::Arc;

use crate::envelope::FaultEnvelope;
use crate::value::WireValue;

/// An invocable operation target.
///
/// Targets own their captured side (handle table, objects); the caller
/// holds only this `Arc`. Faults come back as the translated
/// `FaultEnvelope` form, never as a panic.
pub type OperationTarget =
    Arc<dyn Fn(&[WireValue]) -> Result<WireValue, FaultEnvelope> + Send + Sync>;

/// One named, visible operation of a dispatch surface.
pub struct NamedOperation {
    /// Canonical operation name (matched against `OperationId` names)
    pub name: &'static str,
    /// The invocable target bound to this name
    pub target: OperationTarget,
}

impl NamedOperation {
    /// Create a named operation from a plain closure.
    pub fn new(
        name: &'static str,
        target: impl Fn(&[WireValue]) -> Result<WireValue, FaultEnvelope> + Send + Sync + 'static,
    ) -> Self {
        NamedOperation {
            name,
            target: Arc::new(target),
        }
    }
}

impl std::fmt::Debug for NamedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedOperation")
            .field("name", &self.name)
            .finish()
    }
}

/// An enumerable set of named, visible operations.
///
/// This is the discovery side of registry construction: enumeration is
/// cheap and side-effect free, and the returned list is a snapshot — a
/// surface never grows or shrinks after it is first enumerated.
pub trait DispatchSurface: Send + Sync {
    /// Enumerate every operation this surface exposes.
    fn operations(&self) -> Vec<NamedOperation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoOps;

    impl DispatchSurface for TwoOps {
        fn operations(&self) -> Vec<NamedOperation> {
            vec![
                NamedOperation::new("First", |_| Ok(WireValue::I32(1))),
                NamedOperation::new("Second", |_| Ok(WireValue::I32(2))),
            ]
        }
    }

    #[test]
    fn test_enumeration_and_invocation() {
        let surface = TwoOps;
        let ops = surface.operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name, "First");
        assert_eq!((ops[1].target)(&[]).unwrap(), WireValue::I32(2));
    }
}
