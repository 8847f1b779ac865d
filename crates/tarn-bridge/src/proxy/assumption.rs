//! Proxy for a host-owned assumption-dependency consumer

use std::sync::Arc;

use tarn_bridge_abi::convert::result_unit;
use tarn_bridge_abi::WireValue;

use crate::api::{AssumptionConsumer, DependencyToken};
use crate::fault::BridgeResult;
use crate::handle::HandleRef;
use crate::port::{invoke, HostPort};

/// Compiler-side adapter for a host assumption consumer.
pub struct AssumptionConsumerProxy {
    handle: HandleRef,
    port: Arc<HostPort>,
}

impl AssumptionConsumerProxy {
    pub(crate) fn new(handle: HandleRef, port: Arc<HostPort>) -> Self {
        AssumptionConsumerProxy { handle, port }
    }
}

impl AssumptionConsumer for AssumptionConsumerProxy {
    fn consume_optimized_assumption_dependency(
        &self,
        dependency: DependencyToken,
    ) -> BridgeResult<()> {
        let calls = self.port.consumer_calls()?;
        let result = invoke(
            &calls.consume,
            &[
                WireValue::Handle(self.handle.raw()),
                WireValue::I64(dependency.0 as i64),
            ],
        )?;
        Ok(result_unit(result)?)
    }
}
