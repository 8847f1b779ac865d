//! Exception bridge — fault taxonomy and boundary normalization
//!
//! Two categories of fault are transparent and cross the bridge
//! unchanged in kind: unchecked runtime faults (`RuntimeFault`) and
//! fatal faults (`FatalFault`). Anything else observed while executing a
//! bound operation is wrapped into `RuntimeFault::Wrapped` carrying the
//! original as its source. A fault that already crossed a deeper
//! serialization boundary arrives as a `Translated` envelope and is
//! unwrapped exactly one level before the rules re-apply.
//!
//! The bridge never swallows a fault and never retries.

use tarn_bridge_abi::{FaultEnvelope, FaultKind, WireError};

use crate::registry::RegistryError;

/// Unchecked runtime faults — the recoverable-by-caller category.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeFault {
    /// An operation was invoked in a state that forbids it
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A constructor or call precondition was violated
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// A handle resolved to an object of the wrong capability or type
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type or capability name
        expected: &'static str,
        /// What the handle actually named
        got: String,
    },

    /// A handle named no live entry in the table
    #[error("unknown handle {0}")]
    UnknownHandle(tarn_bridge_abi::RawHandle),

    /// Marshaling failed against an operation's fixed signature
    #[error("marshal error: {0}")]
    Marshal(#[from] WireError),

    /// Operation-table construction failed
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A fault raised by the counterpart, reconstructed from its envelope
    #[error("remote fault: {0}")]
    Remote(String),

    /// Any other fault, wrapped with the original as cause
    #[error("{message}")]
    Wrapped {
        /// Rendered message of the wrapped fault
        message: String,
        /// The original fault
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Fatal faults — unrecoverable; abort the surrounding activity.
#[derive(Debug, thiserror::Error)]
#[error("fatal fault: {0}")]
pub struct FatalFault(pub String);

/// Any fault crossing or raised inside the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeFault {
    /// Unchecked runtime fault (transparent category)
    #[error(transparent)]
    Runtime(#[from] RuntimeFault),

    /// Fatal fault (transparent category)
    #[error(transparent)]
    Fatal(#[from] FatalFault),
}

/// Result type used throughout the bridge
pub type BridgeResult<T> = Result<T, BridgeFault>;

impl From<WireError> for BridgeFault {
    fn from(error: WireError) -> Self {
        RuntimeFault::Marshal(error).into()
    }
}

impl From<RegistryError> for BridgeFault {
    fn from(error: RegistryError) -> Self {
        RuntimeFault::Registry(error).into()
    }
}

impl BridgeFault {
    /// Shorthand for an illegal-state runtime fault.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        RuntimeFault::IllegalState(message.into()).into()
    }

    /// Shorthand for a precondition runtime fault.
    pub fn precondition(message: impl Into<String>) -> Self {
        RuntimeFault::Precondition(message.into()).into()
    }
}

/// Normalize an arbitrary fault observed while executing a bound
/// operation.
///
/// Transparent categories pass through unchanged; everything else is
/// wrapped as a generic unchecked fault carrying the original as cause.
pub fn normalize(fault: Box<dyn std::error::Error + Send + Sync>) -> BridgeFault {
    let fault = match fault.downcast::<BridgeFault>() {
        Ok(bridge) => return *bridge,
        Err(other) => other,
    };
    let fault = match fault.downcast::<RuntimeFault>() {
        Ok(runtime) => return BridgeFault::Runtime(*runtime),
        Err(other) => other,
    };
    match fault.downcast::<FatalFault>() {
        Ok(fatal) => BridgeFault::Fatal(*fatal),
        Err(other) => BridgeFault::Runtime(RuntimeFault::Wrapped {
            message: other.to_string(),
            source: other,
        }),
    }
}

/// Translate a local fault into its wire envelope.
pub fn to_envelope(fault: &BridgeFault) -> FaultEnvelope {
    match fault {
        BridgeFault::Runtime(r) => FaultEnvelope::runtime(r.to_string()),
        BridgeFault::Fatal(f) => FaultEnvelope::fatal(f.0.clone()),
    }
}

/// Reconstruct a fault from its wire envelope on the receiving side.
///
/// A `Translated` envelope is unwrapped exactly one level and the
/// transparent-category rules re-apply to the unwrapped cause, so a
/// translated container whose cause is unchecked or fatal never escapes
/// un-unwrapped. A translated envelope with no cause is malformed and
/// surfaces as a fatal fault.
pub fn from_envelope(envelope: FaultEnvelope) -> BridgeFault {
    match envelope.kind {
        FaultKind::Runtime => RuntimeFault::Remote(envelope.message).into(),
        FaultKind::Fatal => FatalFault(envelope.message).into(),
        FaultKind::Translated => match envelope.cause {
            Some(cause) => match cause.kind {
                FaultKind::Runtime => RuntimeFault::Remote(cause.message).into(),
                FaultKind::Fatal => FatalFault(cause.message).into(),
                // Still translated after one unwrap: wrap as generic
                // unchecked, carrying the remaining envelope as cause.
                FaultKind::Translated => RuntimeFault::Wrapped {
                    message: cause.message.clone(),
                    source: Box::new(*cause),
                }
                .into(),
            },
            None => FatalFault("translated fault with no cause".to_string()).into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct ExternalError;

    #[test]
    fn test_transparent_categories_pass_through() {
        let fault: Box<dyn std::error::Error + Send + Sync> =
            Box::new(RuntimeFault::IllegalState("no".into()));
        assert!(matches!(
            normalize(fault),
            BridgeFault::Runtime(RuntimeFault::IllegalState(_))
        ));

        let fault: Box<dyn std::error::Error + Send + Sync> =
            Box::new(FatalFault("gone".into()));
        assert!(matches!(normalize(fault), BridgeFault::Fatal(_)));
    }

    #[test]
    fn test_other_faults_are_wrapped_with_cause() {
        let fault: Box<dyn std::error::Error + Send + Sync> = Box::new(ExternalError);
        match normalize(fault) {
            BridgeFault::Runtime(RuntimeFault::Wrapped { message, source }) => {
                assert_eq!(message, "disk on fire");
                assert!(source.downcast_ref::<ExternalError>().is_some());
            }
            other => panic!("expected wrapped fault, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_round_trip_runtime() {
        let fault = BridgeFault::illegal_state("closed");
        let back = from_envelope(to_envelope(&fault));
        match back {
            BridgeFault::Runtime(RuntimeFault::Remote(msg)) => {
                assert_eq!(msg, "illegal state: closed")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_envelope_round_trip_fatal() {
        let fault: BridgeFault = FatalFault("broken invariant".into()).into();
        assert!(matches!(
            from_envelope(to_envelope(&fault)),
            BridgeFault::Fatal(FatalFault(msg)) if msg == "broken invariant"
        ));
    }

    #[test]
    fn test_translated_unwraps_exactly_one_level() {
        // Translated(Runtime) must come out as a runtime fault, not as a
        // still-wrapped container.
        let envelope = FaultEnvelope::translated(FaultEnvelope::runtime("inner"));
        assert!(matches!(
            from_envelope(envelope),
            BridgeFault::Runtime(RuntimeFault::Remote(msg)) if msg == "inner"
        ));

        // Translated(Fatal) likewise surfaces as fatal.
        let envelope = FaultEnvelope::translated(FaultEnvelope::fatal("inner"));
        assert!(matches!(from_envelope(envelope), BridgeFault::Fatal(_)));
    }

    #[test]
    fn test_doubly_translated_wraps_remainder() {
        let deep = FaultEnvelope::translated(FaultEnvelope::runtime("deepest"));
        let envelope = FaultEnvelope::translated(deep);
        match from_envelope(envelope) {
            BridgeFault::Runtime(RuntimeFault::Wrapped { source, .. }) => {
                let env = source.downcast_ref::<FaultEnvelope>().unwrap();
                assert_eq!(env.kind, FaultKind::Translated);
            }
            other => panic!("expected wrapped remainder, got {other:?}"),
        }
    }

    #[test]
    fn test_translated_without_cause_is_fatal() {
        let envelope = FaultEnvelope {
            kind: FaultKind::Translated,
            message: "??".into(),
            cause: None,
        };
        assert!(matches!(from_envelope(envelope), BridgeFault::Fatal(_)));
    }
}
