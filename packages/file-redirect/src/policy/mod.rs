// packages/file-redirect/src/policy/mod.rs
//! Redirect policy
//!
//! - **Target Set**: which file names are redirected
//! - **Engine**: what each intercepted operation returns for them
//!
//! The policy is a pure function of the operation and the file's basename.
//! It knows nothing about how calls are intercepted; see [`crate::interception`].

pub mod engine;
pub mod target_set;

// Re-export commonly used types
pub use engine::{FileOperation, HookPhase, InterceptionDecision, OverrideValue, RedirectPolicy};
pub use target_set::{file_name_of, TargetFileSet, TARGET_FILE_NAMES, TARGET_SUBSTRING};
