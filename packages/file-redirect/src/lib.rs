// packages/file-redirect/src/lib.rs
//! File Redirect Library
//!
//! Makes a fixed set of data files look absent and empty to an unmodified
//! program, by intercepting its file-system calls and overriding their results.
//!
//! # Architecture
//!
//! The library is structured into several key modules:
//!
//! - **policy**: target-file matching and per-operation override decisions
//! - **substitute**: empty resources handed out in place of real opens
//! - **interception**: hook wrappers, process filter, LD_PRELOAD shim
//! - **runtime**: launching child processes with the shim preloaded
//! - **selftest**: module info and manual verification
//! - **observability**: logging setup
//! - **utils**: configuration and error types

// Public module exports
pub mod interception;
pub mod observability;
pub mod policy;
pub mod runtime;
pub mod selftest;
pub mod substitute;
pub mod utils;

// Re-export commonly used types
pub use interception::Interceptor;
pub use policy::{FileOperation, OverrideValue, RedirectPolicy};
pub use utils::config::RedirectConfig;
pub use utils::errors::{RedirectError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Build information
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
    pub preload: bool,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
            preload: cfg!(all(feature = "preload", target_os = "linux")),
        }
    }
}
