//! Proxy for a host-owned compile task

use std::sync::Arc;

use tarn_bridge_abi::convert::{result_bool, result_opt_handle, result_opt_str};
use tarn_bridge_abi::WireValue;

use crate::api::{CompilationTask, SourcePosition};
use crate::fault::BridgeResult;
use crate::handle::HandleRef;
use crate::port::{invoke, HostPort};
use crate::proxy::SourcePositionProxy;

/// Compiler-side adapter for a host compile task.
///
/// Cancellation state is live host state, so nothing here is cached —
/// every poll crosses the boundary.
pub struct TaskProxy {
    handle: HandleRef,
    port: Arc<HostPort>,
}

impl TaskProxy {
    pub(crate) fn new(handle: HandleRef, port: Arc<HostPort>) -> Self {
        TaskProxy { handle, port }
    }
}

impl CompilationTask for TaskProxy {
    fn is_cancelled(&self) -> BridgeResult<bool> {
        let calls = self.port.task_calls()?;
        let result = invoke(&calls.is_cancelled, &[WireValue::Handle(self.handle.raw())])?;
        Ok(result_bool(result)?)
    }

    fn cancellation_reason(&self) -> BridgeResult<Option<String>> {
        let calls = self.port.task_calls()?;
        let result = invoke(
            &calls.cancellation_reason,
            &[WireValue::Handle(self.handle.raw())],
        )?;
        Ok(result_opt_str(result)?)
    }

    fn position(&self, node_id: u64) -> BridgeResult<Option<Arc<dyn SourcePosition>>> {
        let calls = self.port.task_calls()?;
        let result = invoke(
            &calls.position,
            &[
                WireValue::Handle(self.handle.raw()),
                WireValue::I64(node_id as i64),
            ],
        )?;
        match result_opt_handle(result)? {
            Some(handle) => {
                // A new host object crossed over: wrap it in a fresh
                // proxy of the position capability.
                let href = HandleRef::new(handle, self.port.releaser()?)?;
                Ok(Some(Arc::new(SourcePositionProxy::new(
                    href,
                    self.port.clone(),
                ))))
            }
            None => Ok(None),
        }
    }
}
