// packages/file-redirect/src/interception/libc_args.rs
//! Reading libc call arguments and shaping hook results
//!
//! Used by the LD_PRELOAD transport; kept free of FFI state so it builds
//! and tests without the `preload` feature.

use libc::c_int;
use std::ffi::CStr;

/// `open` flags that only read
pub fn is_read_only(flags: c_int) -> bool {
    flags & libc::O_ACCMODE == libc::O_RDONLY
}

/// `fopen` mode that only reads: starts with `r` and has no `+`.
///
/// A missing mode never counts as read-only.
pub fn is_read_only_mode(mode: Option<&CStr>) -> bool {
    match mode {
        Some(mode) => {
            let mode = mode.to_bytes();
            mode.first() == Some(&b'r') && !mode.contains(&b'+')
        }
        None => false,
    }
}

/// Outcome of an `access`-style call once the existence hook has run.
///
/// `exists` is what the hook reported, `rc`/`errno` what the real call did.
/// `Err` carries the errno to report with `-1`.
pub fn access_result(exists: bool, rc: c_int, errno: c_int) -> Result<(), c_int> {
    if exists {
        Ok(())
    } else if rc == 0 {
        // Real call succeeded on a target
        Err(libc::ENOENT)
    } else {
        Err(errno)
    }
}
