//! Tarn Bridge ABI - boundary types for the compiler-isolation bridge
//!
//! This crate provides the minimal types both sides of the host/compiler
//! isolation boundary compile against, without depending on the bridge
//! machinery itself:
//! - **Values**: `WireValue`, the closed marshaled-value set, and
//!   `RawHandle`, the opaque cross-heap reference id (`value` module)
//! - **Surfaces**: `NamedOperation` / `DispatchSurface`, the enumerable
//!   operation surface a side exposes for discovery (`surface` module)
//! - **Faults**: `FaultEnvelope`, the translated form a fault takes when
//!   it crosses the boundary (`envelope` module)
//! - **Decoding**: typed argument/result readers with structured
//!   mismatch errors (`convert` module)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod convert;
pub mod envelope;
pub mod surface;
pub mod value;

pub use convert::{Args, WireError, WireResult};
pub use envelope::{FaultEnvelope, FaultKind};
pub use surface::{DispatchSurface, NamedOperation, OperationTarget};
pub use value::{RawHandle, WireValue};
