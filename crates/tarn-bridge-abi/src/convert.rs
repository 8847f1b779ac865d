//! Typed readers for marshaled argument lists and results
//!
//! Operation targets receive `&[WireValue]` and must decode each slot
//! against the operation's fixed signature. Mismatches are data errors
//! (a malformed call), reported as structured `WireError`s rather than
//! panics.

use crate::value::{RawHandle, WireValue};

/// Errors decoding marshaled values against an operation signature
#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    /// Wrong number of arguments for the operation
    #[error("expected {expected} arguments, got {got}")]
    Arity {
        /// Arity the signature requires
        expected: usize,
        /// Arity actually received
        got: usize,
    },

    /// Wrong value variant at an argument position
    #[error("argument {index}: expected {expected}, got {got}")]
    ArgumentType {
        /// Argument position
        index: usize,
        /// Expected variant name
        expected: &'static str,
        /// Received variant name
        got: &'static str,
    },

    /// Wrong value variant returned by an operation
    #[error("result: expected {expected}, got {got}")]
    ResultType {
        /// Expected variant name
        expected: &'static str,
        /// Received variant name
        got: &'static str,
    },

    /// A handle argument was the null sentinel where a live handle is required
    #[error("argument {index}: null handle where a live handle is required")]
    NullHandle {
        /// Argument position
        index: usize,
    },
}

/// Result type for wire decoding
pub type WireResult<T> = Result<T, WireError>;

/// Fixed-arity view over a marshaled argument list.
///
/// Constructed once per call with the signature's arity, then read
/// positionally. Reads do not consume; an argument may be read twice.
#[derive(Debug)]
pub struct Args<'a> {
    values: &'a [WireValue],
}

impl<'a> Args<'a> {
    /// Check arity and wrap the argument list.
    pub fn new(values: &'a [WireValue], expected: usize) -> WireResult<Self> {
        if values.len() != expected {
            return Err(WireError::Arity {
                expected,
                got: values.len(),
            });
        }
        Ok(Args { values })
    }

    fn get(&self, index: usize) -> &'a WireValue {
        // Arity was checked in `new`; a bad index is a caller bug.
        &self.values[index]
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> WireError {
        WireError::ArgumentType {
            index,
            expected,
            got: self.get(index).kind(),
        }
    }

    /// Read a live (non-null) handle.
    pub fn handle(&self, index: usize) -> WireResult<RawHandle> {
        match self.get(index) {
            WireValue::Handle(h) if !h.is_null() => Ok(*h),
            WireValue::Handle(_) => Err(WireError::NullHandle { index }),
            _ => Err(self.mismatch(index, "handle")),
        }
    }

    /// Read an optional handle: explicit `Null` decodes to `None`.
    pub fn opt_handle(&self, index: usize) -> WireResult<Option<RawHandle>> {
        match self.get(index) {
            WireValue::Null => Ok(None),
            WireValue::Handle(h) if !h.is_null() => Ok(Some(*h)),
            WireValue::Handle(_) => Err(WireError::NullHandle { index }),
            _ => Err(self.mismatch(index, "handle or null")),
        }
    }

    /// Read a string slice.
    pub fn str(&self, index: usize) -> WireResult<&'a str> {
        match self.get(index) {
            WireValue::Str(s) => Ok(s),
            _ => Err(self.mismatch(index, "str")),
        }
    }

    /// Read a bool.
    pub fn bool(&self, index: usize) -> WireResult<bool> {
        match self.get(index) {
            WireValue::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(index, "bool")),
        }
    }

    /// Read an i32.
    pub fn i32(&self, index: usize) -> WireResult<i32> {
        match self.get(index) {
            WireValue::I32(v) => Ok(*v),
            _ => Err(self.mismatch(index, "i32")),
        }
    }

    /// Read an i64.
    pub fn i64(&self, index: usize) -> WireResult<i64> {
        match self.get(index) {
            WireValue::I64(v) => Ok(*v),
            _ => Err(self.mismatch(index, "i64")),
        }
    }

    /// Read a byte payload.
    pub fn bytes(&self, index: usize) -> WireResult<&'a [u8]> {
        match self.get(index) {
            WireValue::Bytes(b) => Ok(b),
            _ => Err(self.mismatch(index, "bytes")),
        }
    }
}

/// Decode a `Str` result.
pub fn result_str(value: WireValue) -> WireResult<String> {
    match value {
        WireValue::Str(s) => Ok(s),
        other => Err(WireError::ResultType {
            expected: "str",
            got: other.kind(),
        }),
    }
}

/// Decode an optional `Str` result (`Null` ⇒ `None`).
pub fn result_opt_str(value: WireValue) -> WireResult<Option<String>> {
    match value {
        WireValue::Str(s) => Ok(Some(s)),
        WireValue::Null => Ok(None),
        other => Err(WireError::ResultType {
            expected: "str or null",
            got: other.kind(),
        }),
    }
}

/// Decode a `Bool` result.
pub fn result_bool(value: WireValue) -> WireResult<bool> {
    match value {
        WireValue::Bool(b) => Ok(b),
        other => Err(WireError::ResultType {
            expected: "bool",
            got: other.kind(),
        }),
    }
}

/// Decode an `I32` result.
pub fn result_i32(value: WireValue) -> WireResult<i32> {
    match value {
        WireValue::I32(v) => Ok(v),
        other => Err(WireError::ResultType {
            expected: "i32",
            got: other.kind(),
        }),
    }
}

/// Decode an `I64` result.
pub fn result_i64(value: WireValue) -> WireResult<i64> {
    match value {
        WireValue::I64(v) => Ok(v),
        other => Err(WireError::ResultType {
            expected: "i64",
            got: other.kind(),
        }),
    }
}

/// Decode a `Bytes` result.
pub fn result_bytes(value: WireValue) -> WireResult<Vec<u8>> {
    match value {
        WireValue::Bytes(b) => Ok(b),
        other => Err(WireError::ResultType {
            expected: "bytes",
            got: other.kind(),
        }),
    }
}

/// Decode a live `Handle` result.
pub fn result_handle(value: WireValue) -> WireResult<RawHandle> {
    match value {
        WireValue::Handle(h) if !h.is_null() => Ok(h),
        other => Err(WireError::ResultType {
            expected: "handle",
            got: other.kind(),
        }),
    }
}

/// Decode an optional `Handle` result (`Null` ⇒ `None`).
pub fn result_opt_handle(value: WireValue) -> WireResult<Option<RawHandle>> {
    match value {
        WireValue::Handle(h) if !h.is_null() => Ok(Some(h)),
        WireValue::Null => Ok(None),
        other => Err(WireError::ResultType {
            expected: "handle or null",
            got: other.kind(),
        }),
    }
}

/// Decode a `Unit` result.
pub fn result_unit(value: WireValue) -> WireResult<()> {
    match value {
        WireValue::Unit => Ok(()),
        other => Err(WireError::ResultType {
            expected: "unit",
            got: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_check() {
        let values = vec![WireValue::I32(1)];
        let err = Args::new(&values, 2).unwrap_err();
        assert!(matches!(err, WireError::Arity { expected: 2, got: 1 }));
    }

    #[test]
    fn test_positional_reads() {
        let values = vec![
            WireValue::Handle(RawHandle(3)),
            WireValue::Str("abc".to_string()),
            WireValue::Bool(true),
        ];
        let args = Args::new(&values, 3).unwrap();
        assert_eq!(args.handle(0).unwrap(), RawHandle(3));
        assert_eq!(args.str(1).unwrap(), "abc");
        assert!(args.bool(2).unwrap());
    }

    #[test]
    fn test_null_handle_rejected_where_required() {
        let values = vec![WireValue::Handle(RawHandle::NULL)];
        let args = Args::new(&values, 1).unwrap();
        assert!(matches!(
            args.handle(0),
            Err(WireError::NullHandle { index: 0 })
        ));
    }

    #[test]
    fn test_explicit_null_distinct_from_handle() {
        let values = vec![WireValue::Null, WireValue::Handle(RawHandle(9))];
        let args = Args::new(&values, 2).unwrap();
        assert_eq!(args.opt_handle(0).unwrap(), None);
        assert_eq!(args.opt_handle(1).unwrap(), Some(RawHandle(9)));
    }

    #[test]
    fn test_type_mismatch_names_both_sides() {
        let values = vec![WireValue::I64(5)];
        let args = Args::new(&values, 1).unwrap();
        let err = args.str(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument 0: expected str, got i64"
        );
    }

    #[test]
    fn test_result_decoding() {
        assert_eq!(result_str(WireValue::Str("x".into())).unwrap(), "x");
        assert_eq!(result_opt_handle(WireValue::Null).unwrap(), None);
        assert!(result_unit(WireValue::I32(0)).is_err());
    }
}
