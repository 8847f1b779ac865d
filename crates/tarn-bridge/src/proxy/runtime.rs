//! Proxy for the host runtime's compiler-support services

use std::sync::Arc;

use tarn_bridge_abi::convert::{result_bytes, result_opt_handle, result_unit};
use tarn_bridge_abi::WireValue;

use crate::api::{AssumptionConsumer, AssumptionToken, CompilerRuntime};
use crate::fault::BridgeResult;
use crate::handle::HandleRef;
use crate::options::CompilerOptionsMap;
use crate::port::{invoke, HostPort};
use crate::proxy::AssumptionConsumerProxy;

/// Compiler-side adapter for the host runtime.
pub struct CompilerRuntimeProxy {
    handle: HandleRef,
    port: Arc<HostPort>,
}

impl CompilerRuntimeProxy {
    pub(crate) fn new(handle: HandleRef, port: Arc<HostPort>) -> Self {
        CompilerRuntimeProxy { handle, port }
    }
}

impl CompilerRuntime for CompilerRuntimeProxy {
    fn log(&self, message: &str) -> BridgeResult<()> {
        let calls = self.port.runtime_calls()?;
        let result = invoke(
            &calls.log,
            &[
                WireValue::Handle(self.handle.raw()),
                WireValue::Str(message.to_string()),
            ],
        )?;
        Ok(result_unit(result)?)
    }

    fn initial_options(&self) -> BridgeResult<CompilerOptionsMap> {
        let calls = self.port.runtime_calls()?;
        let result = invoke(
            &calls.initial_options,
            &[WireValue::Handle(self.handle.raw())],
        )?;
        CompilerOptionsMap::decode(&result_bytes(result)?)
    }

    fn register_optimized_assumption(
        &self,
        assumption: AssumptionToken,
    ) -> BridgeResult<Option<Arc<dyn AssumptionConsumer>>> {
        let calls = self.port.runtime_calls()?;
        let result = invoke(
            &calls.register_optimized_assumption,
            &[
                WireValue::Handle(self.handle.raw()),
                WireValue::I64(assumption.0 as i64),
            ],
        )?;
        match result_opt_handle(result)? {
            Some(handle) => {
                let href = HandleRef::new(handle, self.port.releaser()?)?;
                Ok(Some(Arc::new(AssumptionConsumerProxy::new(
                    href,
                    self.port.clone(),
                ))))
            }
            None => Ok(None),
        }
    }
}
