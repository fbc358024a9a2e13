// packages/file-redirect/src/interception/mod.rs
//! Call interception layer
//!
//! This module applies the redirect policy to intercepted file-system calls:
//!
//! - **Hook**: before/after wrappers around real operations ([`Interceptor`])
//! - **Process Filter**: which processes the layer attaches to
//! - **Syscall Interceptor**: locates the LD_PRELOAD shim for child processes
//! - **Preload**: the libc interposition symbols themselves (feature `preload`)
//! - **Libc Args**: open-mode and errno helpers the preload symbols rely on
//!
//! # Architecture
//!
//! ```text
//! Target Process (Unmodified)
//!     │
//!     ├─ access/faccessat ────────┐
//!     ├─ open/openat/fopen (ro) ──┤
//!     ├─ stat/lstat/statx ────────┼─→ Interceptor ─→ RedirectPolicy::decide
//!     └─ unlink/unlinkat/remove ──┘        │
//!                                          └─→ real libc call / override
//! ```

pub mod hook;
pub mod libc_args;
#[cfg(all(feature = "preload", target_os = "linux"))]
pub mod preload;
pub mod process_filter;
pub mod syscall_interceptor;

// Re-export commonly used types
pub use hook::Interceptor;
pub use process_filter::ProcessFilter;
pub use syscall_interceptor::SyscallInterceptor;
