// packages/file-redirect/src/interception/hook.rs
//! Applies policy decisions around real file-system calls
//!
//! Each method takes the path involved and a closure running the real
//! operation. After-phase operations (exists, length, delete) run the real
//! call first and replace its result; the before-phase open swaps the path
//! for a substitute before the real call sees it.

use crate::policy::{file_name_of, FileOperation, OverrideValue, RedirectPolicy};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Call-interception front end over a shared [`RedirectPolicy`]
#[derive(Debug, Clone)]
pub struct Interceptor {
    policy: Arc<RedirectPolicy>,
}

impl Interceptor {
    pub fn new(policy: Arc<RedirectPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RedirectPolicy {
        &self.policy
    }

    /// Existence check; targets always report `false`
    pub fn exists(&self, path: &Path, real: impl FnOnce() -> bool) -> bool {
        self.after(FileOperation::Exists, path, real, |value| match value {
            OverrideValue::Exists(exists) => Some(exists),
            _ => None,
        })
    }

    /// Size query; targets always report `0`
    pub fn length(&self, path: &Path, real: impl FnOnce() -> u64) -> u64 {
        self.after(FileOperation::Length, path, real, |value| match value {
            OverrideValue::Length(len) => Some(len),
            _ => None,
        })
    }

    /// Delete; targets always report success
    pub fn delete(&self, path: &Path, real: impl FnOnce() -> bool) -> bool {
        self.after(FileOperation::Delete, path, real, |value| match value {
            OverrideValue::Deleted(deleted) => Some(deleted),
            _ => None,
        })
    }

    /// Open for reading; targets are opened from an empty substitute.
    ///
    /// A temp file substitute is removed once `open` returns. Anything `open`
    /// produced from it (a descriptor, a `File`) keeps working on Unix.
    pub fn open_for_read<T>(&self, path: &Path, open: impl FnOnce(&Path) -> T) -> T {
        match self.policy.decide_path(FileOperation::OpenForRead, path) {
            Some(OverrideValue::OpenFrom(source)) => {
                record(FileOperation::OpenForRead);
                info!(
                    "Redirected open for {} to {}",
                    display_name(path),
                    source.path().display()
                );
                open(source.path())
            }
            _ => open(path),
        }
    }

    /// Replacement only counts as an override when it differs from the
    /// real result, so a missing target is not logged as blocked.
    fn after<T: PartialEq>(
        &self,
        operation: FileOperation,
        path: &Path,
        real: impl FnOnce() -> T,
        pick: impl FnOnce(OverrideValue) -> Option<T>,
    ) -> T {
        let result = real();

        match self.policy.decide_path(operation, path).and_then(pick) {
            Some(replacement) if replacement != result => {
                record(operation);
                match operation {
                    FileOperation::Exists => info!("Blocked exists() for {}", display_name(path)),
                    FileOperation::Length => info!("Returned 0 length for {}", display_name(path)),
                    FileOperation::Delete => info!("Faked delete success for {}", display_name(path)),
                    FileOperation::OpenForRead => {}
                }
                replacement
            }
            Some(_) | None => result,
        }
    }
}

fn record(operation: FileOperation) {
    metrics::counter!("file_redirect_overrides_total", "operation" => operation.as_str()).increment(1);
}

fn display_name(path: &Path) -> &str {
    file_name_of(path).unwrap_or("<unnamed>")
}
