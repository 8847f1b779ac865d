//! Host side of the bridge
//!
//! The host exposes its capability objects on a `HostSurface`, drives
//! the compiler runtime through a `CompilerGateway`, and scopes each
//! compile's exports in a `CompilationSession`. The one-time bootstrap
//! is `initialize_lookup`, which exchanges the two sides' dispatch
//! tables.

mod gateway;
mod session;
mod surface;

pub use gateway::{CompilerGateway, CompilerHandle, RuntimeHandle};
pub use surface::{HostObject, HostSurface};

use std::sync::Arc;

use crate::fault::BridgeResult;
use crate::isolate::CompilerIsolate;
use crate::registry::{CompilerOp, OperationRegistry};

/// One-time bootstrap: exchange the two sides' dispatch tables.
///
/// Installs the host surface into the isolate's port and resolves the
/// host's table over the isolate's entry-point surface. The exchange is
/// single-use — a second call raises an illegal-state fault regardless
/// of the first call's outcome, and the tables are never rebuilt.
pub fn initialize_lookup(
    isolate: &Arc<CompilerIsolate>,
    host: Arc<HostSurface>,
) -> BridgeResult<CompilerGateway> {
    isolate.claim_lookup()?;
    isolate.port().install(host.clone())?;
    let surface = isolate.surface();
    let registry = Arc::new(OperationRegistry::<CompilerOp>::resolve(surface.as_ref())?);
    host.attach_compiler(&registry)?;
    Ok(CompilerGateway::new(registry, host))
}
