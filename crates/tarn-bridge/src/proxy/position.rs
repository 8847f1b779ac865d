//! Proxy for a host-owned source position

use std::sync::Arc;

use tarn_bridge_abi::convert::{result_i32, result_str};
use tarn_bridge_abi::WireValue;

use crate::api::SourcePosition;
use crate::fault::BridgeResult;
use crate::handle::HandleRef;
use crate::port::{invoke, HostPort};

/// Compiler-side adapter for a host source position.
pub struct SourcePositionProxy {
    handle: HandleRef,
    port: Arc<HostPort>,
}

impl SourcePositionProxy {
    pub(crate) fn new(handle: HandleRef, port: Arc<HostPort>) -> Self {
        SourcePositionProxy { handle, port }
    }
}

impl SourcePosition for SourcePositionProxy {
    fn uri(&self) -> BridgeResult<String> {
        let calls = self.port.position_calls()?;
        let result = invoke(&calls.uri, &[WireValue::Handle(self.handle.raw())])?;
        Ok(result_str(result)?)
    }

    fn line_number(&self) -> BridgeResult<i32> {
        let calls = self.port.position_calls()?;
        let result = invoke(&calls.line_number, &[WireValue::Handle(self.handle.raw())])?;
        Ok(result_i32(result)?)
    }

    fn offset_start(&self) -> BridgeResult<i32> {
        let calls = self.port.position_calls()?;
        let result = invoke(&calls.offset_start, &[WireValue::Handle(self.handle.raw())])?;
        Ok(result_i32(result)?)
    }

    fn offset_end(&self) -> BridgeResult<i32> {
        let calls = self.port.position_calls()?;
        let result = invoke(&calls.offset_end, &[WireValue::Handle(self.handle.raw())])?;
        Ok(result_i32(result)?)
    }
}
