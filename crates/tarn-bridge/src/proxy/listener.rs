//! Proxy for a host-owned compiler listener

use std::sync::Arc;

use tarn_bridge_abi::convert::result_unit;
use tarn_bridge_abi::WireValue;

use crate::api::{
    CompilationTier, CompiledUnitInfo, CompilerListener, FailureDetail, GraphStats,
};
use crate::fault::BridgeResult;
use crate::handle::HandleRef;
use crate::port::{invoke, HostPort};

/// Compiler-side adapter for a host listener. Callbacks are one-way:
/// the proxy waits only for the acknowledgment, never for a result.
pub struct ListenerProxy {
    handle: HandleRef,
    port: Arc<HostPort>,
}

impl ListenerProxy {
    pub(crate) fn new(handle: HandleRef, port: Arc<HostPort>) -> Self {
        ListenerProxy { handle, port }
    }

    fn fire(&self, target: &tarn_bridge_abi::OperationTarget, args: &[WireValue]) -> BridgeResult<()> {
        let result = invoke(target, args)?;
        Ok(result_unit(result)?)
    }
}

impl CompilerListener for ListenerProxy {
    fn on_ir_tier_finished(&self, graph: &GraphStats) -> BridgeResult<()> {
        let calls = self.port.listener_calls()?;
        self.fire(
            &calls.on_ir_tier_finished,
            &[
                WireValue::Handle(self.handle.raw()),
                WireValue::I32(graph.node_count as i32),
            ],
        )
    }

    fn on_codegen_tier_finished(&self, graph: &GraphStats) -> BridgeResult<()> {
        let calls = self.port.listener_calls()?;
        self.fire(
            &calls.on_codegen_tier_finished,
            &[
                WireValue::Handle(self.handle.raw()),
                WireValue::I32(graph.node_count as i32),
            ],
        )
    }

    fn on_compilation_retry(&self) -> BridgeResult<()> {
        let calls = self.port.listener_calls()?;
        self.fire(
            &calls.on_compilation_retry,
            &[WireValue::Handle(self.handle.raw())],
        )
    }

    fn on_success(&self, result: &CompiledUnitInfo) -> BridgeResult<()> {
        let calls = self.port.listener_calls()?;
        self.fire(
            &calls.on_success,
            &[
                WireValue::Handle(self.handle.raw()),
                WireValue::I32(result.tier.as_wire()),
                WireValue::I32(result.target_code_size as i32),
                WireValue::I32(result.total_frame_size as i32),
                WireValue::I32(result.graph.node_count as i32),
            ],
        )
    }

    fn on_failure(
        &self,
        reason: &str,
        bailout: bool,
        permanent_bailout: bool,
        tier: CompilationTier,
        detail: Option<FailureDetail>,
    ) -> BridgeResult<()> {
        let calls = self.port.listener_calls()?;
        // Ownership of the detail supplier transfers to the host with
        // this call; the host side rewraps the handle on receipt.
        let detail_value = WireValue::opt_handle(detail.map(FailureDetail::into_raw));
        self.fire(
            &calls.on_failure,
            &[
                WireValue::Handle(self.handle.raw()),
                WireValue::Str(reason.to_string()),
                WireValue::Bool(bailout),
                WireValue::Bool(permanent_bailout),
                WireValue::I32(tier.as_wire()),
                detail_value,
            ],
        )
    }
}
