//! CompilationSession — host-side exports for one `do_compile` call
//!
//! Aggregates the compilable (required) and task/listener (optional)
//! exports for a single compile. On the normal path the compiler side's
//! proxies own the references and release them as they drop; the session
//! only reclaims exports the compiler side never claimed (a fault before
//! the proxies existed). Torn down at call exit regardless of outcome.

use std::sync::Arc;

use tarn_bridge_abi::{RawHandle, WireValue};

use crate::api::{CompilationTask, Compilable, CompilerListener};
use crate::host::surface::{HostObject, HostSurface};

pub(crate) struct CompilationSession<'a> {
    surface: &'a HostSurface,
    compilable: RawHandle,
    task: Option<RawHandle>,
    listener: Option<RawHandle>,
}

impl<'a> CompilationSession<'a> {
    pub(crate) fn new(
        surface: &'a HostSurface,
        compilable: Arc<dyn Compilable>,
        task: Option<Arc<dyn CompilationTask>>,
        listener: Option<Arc<dyn CompilerListener>>,
    ) -> Self {
        CompilationSession {
            surface,
            compilable: surface.export(HostObject::Compilable(compilable)),
            task: task.map(|t| surface.export(HostObject::Task(t))),
            listener: listener.map(|l| surface.export(HostObject::Listener(l))),
        }
    }

    pub(crate) fn compilable_value(&self) -> WireValue {
        WireValue::Handle(self.compilable)
    }

    pub(crate) fn task_value(&self) -> WireValue {
        WireValue::opt_handle(self.task)
    }

    pub(crate) fn listener_value(&self) -> WireValue {
        WireValue::opt_handle(self.listener)
    }
}

impl Drop for CompilationSession<'_> {
    fn drop(&mut self) {
        let table = self.surface.table();
        // Claimed exports were already released by the proxies; only the
        // unclaimed leftovers go here.
        table.release_if_present(self.compilable);
        if let Some(task) = self.task {
            table.release_if_present(task);
        }
        if let Some(listener) = self.listener {
            table.release_if_present(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::BridgeResult;

    struct Unit;

    impl Compilable for Unit {
        fn name(&self) -> BridgeResult<String> {
            Ok("unit".into())
        }
        fn display_string(&self) -> BridgeResult<String> {
            Ok("unit()".into())
        }
        fn failed_speculations_address(&self) -> BridgeResult<u64> {
            Ok(0)
        }
        fn on_compilation_failed(&self, _: &str, _: bool, _: bool) -> BridgeResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_session_reclaims_unclaimed_exports() {
        let surface = HostSurface::new();
        {
            let session = CompilationSession::new(&surface, Arc::new(Unit), None, None);
            assert_eq!(surface.handle_count(), 1);
            drop(session);
        }
        assert_eq!(surface.handle_count(), 0);
    }

    #[test]
    fn test_session_leaves_already_released_exports_alone() {
        let surface = HostSurface::new();
        let session = CompilationSession::new(&surface, Arc::new(Unit), None, None);
        // Simulate the compiler side releasing its reference mid-call.
        surface.table().release(self_handle(&session)).unwrap();
        drop(session);
        assert_eq!(surface.handle_count(), 0);
    }

    fn self_handle(session: &CompilationSession<'_>) -> RawHandle {
        match session.compilable_value() {
            WireValue::Handle(h) => h,
            _ => unreachable!(),
        }
    }
}
