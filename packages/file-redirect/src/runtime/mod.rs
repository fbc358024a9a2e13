// packages/file-redirect/src/runtime/mod.rs
//! Runtime for processes launched under the shim
//!
//! - **Process Manager**: spawns a command with `LD_PRELOAD` set, waits for
//!   it, and forwards Ctrl-C

pub mod process_manager;

// Re-export commonly used types
pub use process_manager::{ProcessManager, SpawnConfig};
