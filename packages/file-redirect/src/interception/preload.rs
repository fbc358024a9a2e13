// packages/file-redirect/src/interception/preload.rs
//! LD_PRELOAD transport (Linux only, feature `preload`)
//!
//! Interposes libc entry points and routes the ones touching a target file
//! through [`Interceptor`]:
//!
//! | Symbols                                            | Operation   |
//! |----------------------------------------------------|-------------|
//! | `access`, `faccessat`                              | Exists      |
//! | `open`, `open64`, `openat`, `openat64`, `fopen`, `fopen64` (read-only) | OpenForRead |
//! | `stat`, `lstat`, `fstatat`, `stat64`, `lstat64`, `statx`, `__xstat`, `__lxstat` | Length |
//! | `unlink`, `unlinkat`, `remove`                     | Delete      |
//!
//! Real implementations are looked up with `dlsym(RTLD_NEXT)`. A thread-local
//! guard sends every call made while a hook is already running (config
//! loading, logging, temp file creation) straight to libc.
//! Linked into an executable rather than preloaded, the symbols pass every
//! call straight through.
//!
//! Build with `cargo build --release --features preload` and run a program
//! with `LD_PRELOAD=target/release/libfile_redirect.so`, or use
//! `file-redirect run -- <command>`.

#![allow(clippy::missing_safety_doc)]

use crate::interception::hook::Interceptor;
use crate::interception::libc_args::{access_result, is_read_only, is_read_only_mode};
use crate::interception::process_filter::ProcessFilter;
use crate::observability::init_tracing;
use crate::policy::RedirectPolicy;
use crate::utils::config::RedirectConfig;
use libc::{c_char, c_int, c_uint, mode_t, FILE};
use once_cell::sync::{Lazy, OnceCell};
use std::cell::Cell;
use std::ffi::{CStr, CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

type AccessFn = unsafe extern "C" fn(*const c_char, c_int) -> c_int;
type FaccessatFn = unsafe extern "C" fn(c_int, *const c_char, c_int, c_int) -> c_int;
type OpenFn = unsafe extern "C" fn(*const c_char, c_int, ...) -> c_int;
type OpenatFn = unsafe extern "C" fn(c_int, *const c_char, c_int, ...) -> c_int;
type FopenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE;
type StatFn = unsafe extern "C" fn(*const c_char, *mut libc::stat) -> c_int;
type Stat64Fn = unsafe extern "C" fn(*const c_char, *mut libc::stat64) -> c_int;
type FstatatFn = unsafe extern "C" fn(c_int, *const c_char, *mut libc::stat, c_int) -> c_int;
type XstatFn = unsafe extern "C" fn(c_int, *const c_char, *mut libc::stat) -> c_int;
type StatxFn = unsafe extern "C" fn(c_int, *const c_char, c_int, c_uint, *mut libc::statx) -> c_int;
type UnlinkFn = unsafe extern "C" fn(*const c_char) -> c_int;
type UnlinkatFn = unsafe extern "C" fn(c_int, *const c_char, c_int) -> c_int;

/// Resolve and cache the next definition of a libc symbol
macro_rules! real {
    ($name:literal as $ty:ty) => {{
        static REAL: Lazy<Option<$ty>> = Lazy::new(|| unsafe {
            let symbol = libc::dlsym(libc::RTLD_NEXT, concat!($name, "\0").as_ptr() as *const c_char);
            if symbol.is_null() {
                None
            } else {
                Some(std::mem::transmute::<*mut libc::c_void, $ty>(symbol))
            }
        });
        *REAL
    }};
}

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as running inside a hook
struct HookGuard;

impl HookGuard {
    fn enter() -> Option<Self> {
        IN_HOOK
            .try_with(|active| if active.replace(true) { None } else { Some(HookGuard) })
            .ok()
            .flatten()
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let _ = IN_HOOK.try_with(|active| active.set(false));
    }
}

/// `None` when the current process is not attached
static LAYER: OnceCell<Option<Interceptor>> = OnceCell::new();

fn layer() -> Option<&'static Interceptor> {
    LAYER.get_or_init(build_layer).as_ref()
}

fn build_layer() -> Option<Interceptor> {
    if !loaded_as_shared_object() {
        return None;
    }

    let (config, load_error) = match RedirectConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (RedirectConfig::default(), Some(e)),
    };

    init_tracing(&config.logging);
    if let Some(e) = load_error {
        warn!("Ignoring shim configuration: {}", e);
    }

    if !ProcessFilter::from_config(&config.attach).attaches_to_current() {
        return None;
    }

    info!("FileRedirect: hooking process {}", std::process::id());
    Some(Interceptor::new(Arc::new(RedirectPolicy::from_config(&config))))
}

/// Hooks act only in a preloaded copy of the library. Linked into an
/// executable (the launcher, test binaries) the symbols stay inert.
fn loaded_as_shared_object() -> bool {
    unsafe {
        let mut own: libc::Dl_info = std::mem::zeroed();
        let mut main: libc::Dl_info = std::mem::zeroed();
        let entry = libc::getauxval(libc::AT_ENTRY) as *const libc::c_void;

        if libc::dladdr(loaded_as_shared_object as *const libc::c_void, &mut own) == 0
            || libc::dladdr(entry, &mut main) == 0
        {
            return true;
        }
        own.dli_fbase != main.dli_fbase
    }
}

/// Run `hooked` with the interceptor and decoded path, or `passthrough`
/// when re-entered, not attached, or given a null path.
fn with_layer<R>(
    path: *const c_char,
    passthrough: impl FnOnce() -> R,
    hooked: impl FnOnce(&Interceptor, &Path) -> R,
) -> R {
    let Some(_guard) = HookGuard::enter() else {
        return passthrough();
    };
    let Some(interceptor) = layer() else {
        return passthrough();
    };
    if path.is_null() {
        return passthrough();
    }

    let path_ref = Path::new(OsStr::from_bytes(unsafe { CStr::from_ptr(path) }.to_bytes()));
    hooked(interceptor, path_ref)
}

fn errno() -> c_int {
    unsafe { *libc::__errno_location() }
}

fn set_errno(value: c_int) {
    unsafe { *libc::__errno_location() = value }
}

fn missing_symbol() -> c_int {
    set_errno(libc::ENOSYS);
    -1
}

/// Borrow a C string argument, `None` for null
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a CStr> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr))
    }
}

/// Existence check shared by `access` and `faccessat`
fn exists_hook(path: *const c_char, real: impl FnOnce() -> c_int) -> c_int {
    let mut rc = 0;
    let mut saved_errno = 0;
    let mut real = Some(real);

    let exists = with_layer(
        path,
        || None,
        |interceptor, p| {
            Some(interceptor.exists(p, || {
                rc = real.take().map_or(-1, |call| call());
                saved_errno = errno();
                rc == 0
            }))
        },
    );

    match exists {
        None => real.take().map_or_else(missing_symbol, |call| call()),
        Some(exists) => match access_result(exists, rc, saved_errno) {
            Ok(()) => 0,
            Err(code) => {
                set_errno(code);
                -1
            }
        },
    }
}

/// Read-only open shared by the `open` family; `real` receives the path to open
fn open_hook<R>(path: *const c_char, read_only: bool, real: impl Fn(*const c_char) -> R) -> R {
    with_layer(
        path,
        || real(path),
        |interceptor, p| {
            if !read_only {
                return real(path);
            }
            interceptor.open_for_read(p, |target| {
                if target == p {
                    return real(path);
                }
                match CString::new(target.as_os_str().as_bytes()) {
                    Ok(substitute) => real(substitute.as_ptr()),
                    Err(_) => real(path),
                }
            })
        },
    )
}

/// Size query shared by the `stat` family; `real` fills the buffer,
/// `size` reads it back, `zero` clears size and block count.
fn length_hook(
    path: *const c_char,
    real: impl FnOnce() -> c_int,
    size: impl Fn() -> u64,
    zero: impl FnOnce(),
) -> c_int {
    let mut rc = 0;
    let mut real = Some(real);

    let length = with_layer(
        path,
        || None,
        |interceptor, p| {
            Some(interceptor.length(p, || {
                rc = real.take().map_or(-1, |call| call());
                if rc == 0 {
                    size()
                } else {
                    0
                }
            }))
        },
    );

    match length {
        // Passed through without calling the real function yet
        None => real.take().map_or_else(missing_symbol, |call| call()),
        Some(length) => {
            if rc == 0 && length != size() {
                zero();
            }
            rc
        }
    }
}

/// Delete shared by `unlink`, `unlinkat` and `remove`
fn delete_hook(path: *const c_char, real: impl FnOnce() -> c_int) -> c_int {
    let mut rc = 0;
    let mut real = Some(real);

    let deleted = with_layer(
        path,
        || None,
        |interceptor, p| {
            Some(interceptor.delete(p, || {
                rc = real.take().map_or(-1, |call| call());
                rc == 0
            }))
        },
    );

    match deleted {
        None => real.take().map_or_else(missing_symbol, |call| call()),
        Some(true) => 0,
        Some(false) => rc,
    }
}

#[no_mangle]
pub unsafe extern "C" fn access(path: *const c_char, mode: c_int) -> c_int {
    let Some(real) = real!("access" as AccessFn) else {
        return missing_symbol();
    };
    exists_hook(path, || real(path, mode))
}

#[no_mangle]
pub unsafe extern "C" fn faccessat(dirfd: c_int, path: *const c_char, mode: c_int, flags: c_int) -> c_int {
    let Some(real) = real!("faccessat" as FaccessatFn) else {
        return missing_symbol();
    };
    exists_hook(path, || real(dirfd, path, mode, flags))
}

// `open` and `openat` are variadic in C. Stable Rust cannot define variadic
// functions, so the optional mode is taken as a fixed third argument; on the
// supported Linux ABIs it arrives in the same register either way.

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let Some(real) = real!("open" as OpenFn) else {
        return missing_symbol();
    };
    open_hook(path, is_read_only(flags), |p| real(p, flags, mode as c_uint))
}

#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let Some(real) = real!("open64" as OpenFn) else {
        return missing_symbol();
    };
    open_hook(path, is_read_only(flags), |p| real(p, flags, mode as c_uint))
}

#[no_mangle]
pub unsafe extern "C" fn openat(dirfd: c_int, path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let Some(real) = real!("openat" as OpenatFn) else {
        return missing_symbol();
    };
    // Substitute paths are absolute, so `dirfd` is ignored for them
    open_hook(path, is_read_only(flags), |p| real(dirfd, p, flags, mode as c_uint))
}

#[no_mangle]
pub unsafe extern "C" fn openat64(dirfd: c_int, path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let Some(real) = real!("openat64" as OpenatFn) else {
        return missing_symbol();
    };
    open_hook(path, is_read_only(flags), |p| real(dirfd, p, flags, mode as c_uint))
}

#[no_mangle]
pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE {
    let Some(real) = real!("fopen" as FopenFn) else {
        set_errno(libc::ENOSYS);
        return std::ptr::null_mut();
    };
    open_hook(path, is_read_only_mode(c_str(mode)), |p| real(p, mode))
}

#[no_mangle]
pub unsafe extern "C" fn fopen64(path: *const c_char, mode: *const c_char) -> *mut FILE {
    let Some(real) = real!("fopen64" as FopenFn) else {
        set_errno(libc::ENOSYS);
        return std::ptr::null_mut();
    };
    open_hook(path, is_read_only_mode(c_str(mode)), |p| real(p, mode))
}

#[no_mangle]
pub unsafe extern "C" fn stat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    let Some(real) = real!("stat" as StatFn) else {
        return missing_symbol();
    };
    length_hook(
        path,
        || real(path, buf),
        || (*buf).st_size as u64,
        || {
            (*buf).st_size = 0;
            (*buf).st_blocks = 0;
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn lstat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    let Some(real) = real!("lstat" as StatFn) else {
        return missing_symbol();
    };
    length_hook(
        path,
        || real(path, buf),
        || (*buf).st_size as u64,
        || {
            (*buf).st_size = 0;
            (*buf).st_blocks = 0;
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn stat64(path: *const c_char, buf: *mut libc::stat64) -> c_int {
    let Some(real) = real!("stat64" as Stat64Fn) else {
        return missing_symbol();
    };
    length_hook(
        path,
        || real(path, buf),
        || (*buf).st_size as u64,
        || {
            (*buf).st_size = 0;
            (*buf).st_blocks = 0;
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn lstat64(path: *const c_char, buf: *mut libc::stat64) -> c_int {
    let Some(real) = real!("lstat64" as Stat64Fn) else {
        return missing_symbol();
    };
    length_hook(
        path,
        || real(path, buf),
        || (*buf).st_size as u64,
        || {
            (*buf).st_size = 0;
            (*buf).st_blocks = 0;
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn fstatat(dirfd: c_int, path: *const c_char, buf: *mut libc::stat, flags: c_int) -> c_int {
    let Some(real) = real!("fstatat" as FstatatFn) else {
        return missing_symbol();
    };
    length_hook(
        path,
        || real(dirfd, path, buf, flags),
        || (*buf).st_size as u64,
        || {
            (*buf).st_size = 0;
            (*buf).st_blocks = 0;
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn statx(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mask: c_uint,
    buf: *mut libc::statx,
) -> c_int {
    let Some(real) = real!("statx" as StatxFn) else {
        return missing_symbol();
    };
    length_hook(
        path,
        || real(dirfd, path, flags, mask, buf),
        || (*buf).stx_size,
        || {
            (*buf).stx_size = 0;
            (*buf).stx_blocks = 0;
        },
    )
}

// Pre-2.33 glibc routes stat/lstat through these versioned entry points.

#[no_mangle]
pub unsafe extern "C" fn __xstat(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int {
    let Some(real) = real!("__xstat" as XstatFn) else {
        return missing_symbol();
    };
    length_hook(
        path,
        || real(ver, path, buf),
        || (*buf).st_size as u64,
        || {
            (*buf).st_size = 0;
            (*buf).st_blocks = 0;
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn __lxstat(ver: c_int, path: *const c_char, buf: *mut libc::stat) -> c_int {
    let Some(real) = real!("__lxstat" as XstatFn) else {
        return missing_symbol();
    };
    length_hook(
        path,
        || real(ver, path, buf),
        || (*buf).st_size as u64,
        || {
            (*buf).st_size = 0;
            (*buf).st_blocks = 0;
        },
    )
}

#[no_mangle]
pub unsafe extern "C" fn unlink(path: *const c_char) -> c_int {
    let Some(real) = real!("unlink" as UnlinkFn) else {
        return missing_symbol();
    };
    delete_hook(path, || real(path))
}

#[no_mangle]
pub unsafe extern "C" fn unlinkat(dirfd: c_int, path: *const c_char, flags: c_int) -> c_int {
    let Some(real) = real!("unlinkat" as UnlinkatFn) else {
        return missing_symbol();
    };
    delete_hook(path, || real(dirfd, path, flags))
}

#[no_mangle]
pub unsafe extern "C" fn remove(path: *const c_char) -> c_int {
    let Some(real) = real!("remove" as UnlinkFn) else {
        return missing_symbol();
    };
    delete_hook(path, || real(path))
}
