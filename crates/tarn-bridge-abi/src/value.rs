//! WireValue — the closed marshaled-value set crossing the isolation boundary
//!
//! Every cross-heap call is expressed as `&[WireValue]` in and one
//! `WireValue` out. Heap objects never cross directly: they cross as
//! `Handle` (an id into the owning side's handle table) or as `Null`,
//! the explicit absent-object marker.

use std::fmt;

/// Opaque id of an object in a remote heap's handle table.
///
/// The id itself carries no meaning on the local side; business logic
/// only ever passes it back through bound operations. `0` is the null
/// sentinel and never names a live table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RawHandle(pub u64);

impl RawHandle {
    /// The null sentinel — never a live handle.
    pub const NULL: RawHandle = RawHandle(0);

    /// Whether this is the null sentinel.
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value marshaled across the isolation boundary.
///
/// The set is closed: operations with richer payloads (options maps,
/// diagnostics) encode them as `Bytes` with an agreed codec rather than
/// growing the enum.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// No value (void result)
    Unit,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 64-bit float
    F64(f64),
    /// UTF-8 string
    Str(String),
    /// Opaque byte payload (serde-encoded structures)
    Bytes(Vec<u8>),
    /// Reference to an object in the callee-visible handle table
    Handle(RawHandle),
    /// Explicit absent object — distinct from omitting an argument
    Null,
}

impl WireValue {
    /// Name of this value's variant, for mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            WireValue::Unit => "unit",
            WireValue::Bool(_) => "bool",
            WireValue::I32(_) => "i32",
            WireValue::I64(_) => "i64",
            WireValue::F64(_) => "f64",
            WireValue::Str(_) => "str",
            WireValue::Bytes(_) => "bytes",
            WireValue::Handle(_) => "handle",
            WireValue::Null => "null",
        }
    }

    /// Wrap an optional handle: `None` crosses as explicit `Null`.
    pub fn opt_handle(handle: Option<RawHandle>) -> Self {
        match handle {
            Some(h) => WireValue::Handle(h),
            None => WireValue::Null,
        }
    }

    /// Wrap an optional string: `None` crosses as explicit `Null`.
    pub fn opt_str(s: Option<String>) -> Self {
        match s {
            Some(s) => WireValue::Str(s),
            None => WireValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sentinel() {
        assert!(RawHandle::NULL.is_null());
        assert!(!RawHandle(1).is_null());
    }

    #[test]
    fn test_opt_handle_wrapping() {
        assert_eq!(WireValue::opt_handle(None), WireValue::Null);
        assert_eq!(
            WireValue::opt_handle(Some(RawHandle(7))),
            WireValue::Handle(RawHandle(7))
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(WireValue::Unit.kind(), "unit");
        assert_eq!(WireValue::Handle(RawHandle(1)).kind(), "handle");
        assert_eq!(WireValue::Null.kind(), "null");
    }
}
