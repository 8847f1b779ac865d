//! Cross-heap handles: per-heap tables and the exclusive ownership wrapper
//!
//! Objects never cross the isolation boundary; handles do. The exporting
//! side pins the object in its `HandleTable` for as long as the other
//! side references it; the importing side wraps the handle in a
//! `HandleRef`, whose drop issues the remote-release call exactly once.

mod href;
mod table;

pub use href::{HandleRef, HandleReleaser};
pub use table::HandleTable;
