//! Proxy for a host-owned compilable unit

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tarn_bridge_abi::convert::{result_i64, result_str, result_unit};
use tarn_bridge_abi::WireValue;

use crate::api::Compilable;
use crate::fault::{BridgeFault, BridgeResult};
use crate::handle::HandleRef;
use crate::port::{invoke, HostPort};

/// Compiler-side adapter for a host compilable.
///
/// The display name, string form and failed-speculations address are
/// pure on the host side, so they are fetched once and cached
/// monotonically; repeated reads never cross the boundary again.
pub struct CompilableProxy {
    handle: HandleRef,
    port: Arc<HostPort>,
    name: OnceCell<String>,
    display: OnceCell<String>,
    speculations_address: OnceCell<u64>,
}

impl CompilableProxy {
    pub(crate) fn new(handle: HandleRef, port: Arc<HostPort>) -> Self {
        CompilableProxy {
            handle,
            port,
            name: OnceCell::new(),
            display: OnceCell::new(),
            speculations_address: OnceCell::new(),
        }
    }
}

impl Compilable for CompilableProxy {
    fn name(&self) -> BridgeResult<String> {
        let name = self.name.get_or_try_init(|| -> BridgeResult<String> {
            let calls = self.port.compilable_calls()?;
            let result = invoke(&calls.name, &[WireValue::Handle(self.handle.raw())])?;
            Ok(result_str(result)?)
        })?;
        Ok(name.clone())
    }

    fn display_string(&self) -> BridgeResult<String> {
        let display = self.display.get_or_try_init(|| -> BridgeResult<String> {
            let calls = self.port.compilable_calls()?;
            let result = invoke(&calls.to_string, &[WireValue::Handle(self.handle.raw())])?;
            Ok(result_str(result)?)
        })?;
        Ok(display.clone())
    }

    fn failed_speculations_address(&self) -> BridgeResult<u64> {
        let address = self
            .speculations_address
            .get_or_try_init(|| -> BridgeResult<u64> {
                let calls = self.port.compilable_calls()?;
                let result = invoke(
                    &calls.failed_speculations_address,
                    &[WireValue::Handle(self.handle.raw())],
                )?;
                Ok(result_i64(result)? as u64)
            })?;
        Ok(*address)
    }

    fn on_compilation_failed(
        &self,
        reason: &str,
        bailout: bool,
        permanent_bailout: bool,
    ) -> BridgeResult<()> {
        let calls = self.port.compilable_calls()?;
        let result = invoke(
            &calls.on_compilation_failed,
            &[
                WireValue::Handle(self.handle.raw()),
                WireValue::Str(reason.to_string()),
                WireValue::Bool(bailout),
                WireValue::Bool(permanent_bailout),
            ],
        )?;
        result_unit(result).map_err(BridgeFault::from)
    }
}
