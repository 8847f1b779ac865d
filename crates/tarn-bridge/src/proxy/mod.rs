//! Proxy adapters — compiler-side stand-ins for host-heap objects
//!
//! Each proxy holds exactly one `HandleRef` and implements exactly one
//! capability contract, forwarding every method through the port's
//! resolved call tables. Primitives pass through unchanged; a returned
//! handle naming a new host object is rewrapped into a new proxy of the
//! right capability. Proxies carry no mutable state beyond monotonic
//! unset→set caches, and never retry a failed call.

mod assumption;
mod compilable;
mod listener;
mod position;
mod runtime;
mod task;

pub use assumption::AssumptionConsumerProxy;
pub use compilable::CompilableProxy;
pub use listener::ListenerProxy;
pub use position::SourcePositionProxy;
pub use runtime::CompilerRuntimeProxy;
pub use task::TaskProxy;
