//! FaultEnvelope — the translated form of a fault crossing the boundary
//!
//! A fault raised while executing a bound operation cannot cross the
//! isolation boundary as a live error value; it crosses as this envelope
//! and is re-normalized by the receiving side's exception bridge. The
//! envelope may nest one level when a bound call itself received a
//! translated fault and re-raised it.

/// Category tag of a fault crossing the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Unchecked runtime fault — transparent, rethrown unchanged in kind
    Runtime,
    /// Fatal fault — transparent, rethrown unchanged in kind
    Fatal,
    /// A fault that was itself already translated at a deeper boundary
    Translated,
}

/// Wire form of a fault.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct FaultEnvelope {
    /// Category the raising side assigned
    pub kind: FaultKind,
    /// Rendered fault message
    pub message: String,
    /// Underlying cause for `Translated` envelopes
    pub cause: Option<Box<FaultEnvelope>>,
}

impl FaultEnvelope {
    /// An unchecked runtime fault envelope.
    pub fn runtime(message: impl Into<String>) -> Self {
        FaultEnvelope {
            kind: FaultKind::Runtime,
            message: message.into(),
            cause: None,
        }
    }

    /// A fatal fault envelope.
    pub fn fatal(message: impl Into<String>) -> Self {
        FaultEnvelope {
            kind: FaultKind::Fatal,
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap an already-translated fault one level deeper.
    pub fn translated(cause: FaultEnvelope) -> Self {
        FaultEnvelope {
            kind: FaultKind::Translated,
            message: cause.message.clone(),
            cause: Some(Box::new(cause)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translated_keeps_cause() {
        let inner = FaultEnvelope::runtime("boom");
        let outer = FaultEnvelope::translated(inner.clone());
        assert_eq!(outer.kind, FaultKind::Translated);
        assert_eq!(outer.message, "boom");
        assert_eq!(*outer.cause.unwrap(), inner);
    }

    #[test]
    fn test_display_is_message() {
        assert_eq!(FaultEnvelope::fatal("dead").to_string(), "dead");
    }
}
