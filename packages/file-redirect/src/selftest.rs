// packages/file-redirect/src/selftest.rs
//! Module info and a self-test for manual verification
//!
//! The self-test creates the target files with real content, then checks
//! them the way a hooked application would. With an [`Interceptor`] the
//! checks go through the in-process hooks; without one they are plain libc
//! calls, which only show redirection when the process runs under the
//! LD_PRELOAD shim.

use crate::interception::Interceptor;
use crate::policy::{RedirectPolicy, TARGET_FILE_NAMES};
use crate::utils::errors::Result;
use chrono::{DateTime, Utc};
use nix::unistd::{access, AccessFlags};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Content written to each target before probing
const PROBE_CONTENT: &[u8] = b"file-redirect self-test payload\n";

/// Human-readable description of the module
pub fn module_info(policy: &RedirectPolicy) -> String {
    let mut info = String::new();
    let _ = writeln!(info, "File redirect shim v{}", crate::VERSION);
    let _ = writeln!(info);
    let _ = writeln!(info, "Intercepted operations:");
    let _ = writeln!(info, "  - exists        (access, faccessat)        -> false");
    let _ = writeln!(info, "  - open for read (open, openat, fopen)      -> empty substitute");
    let _ = writeln!(info, "  - length        (stat, lstat, statx)       -> 0");
    let _ = writeln!(info, "  - delete        (unlink, unlinkat, remove) -> success");
    let _ = writeln!(info);
    let _ = writeln!(info, "Target files:");
    for name in policy.targets().literals() {
        let _ = writeln!(info, "  - {}", name);
    }
    let _ = writeln!(info, "  - any name containing \"{}\"", policy.targets().substring());
    let _ = writeln!(info);
    let _ = writeln!(info, "Usage:");
    let _ = writeln!(info, "  1. cargo build --release --features preload");
    let _ = writeln!(info, "  2. file-redirect run -- <command>");
    let _ = writeln!(info, "  3. file-redirect selftest to check the hooks");
    info
}

/// Outcome of probing one target file
#[derive(Debug, Clone, Serialize)]
pub struct FileProbe {
    pub name: String,
    pub path: PathBuf,

    /// What the existence check reported
    pub exists: bool,

    /// What the size query reported
    pub length: u64,

    /// Bytes actually read through the open call
    pub bytes_read: usize,

    /// What the delete call reported
    pub deleted: bool,
}

impl FileProbe {
    /// Every answer matches a redirected file
    pub fn redirected(&self) -> bool {
        !self.exists && self.length == 0 && self.bytes_read == 0 && self.deleted
    }
}

/// Self-test results
#[derive(Debug, Clone, Serialize)]
pub struct SelfTestReport {
    pub generated_at: DateTime<Utc>,
    pub directory: PathBuf,
    pub probes: Vec<FileProbe>,
    pub hooks_active: bool,
}

impl SelfTestReport {
    /// Plain-text rendering for the terminal
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Self-test in {}", self.directory.display());
        for (index, probe) in self.probes.iter().enumerate() {
            let _ = writeln!(
                out,
                "File {} ({}): exists={} length={} read={}B deleted={}",
                index + 1,
                probe.name,
                probe.exists,
                probe.length,
                probe.bytes_read,
                probe.deleted
            );
        }
        let _ = writeln!(out);
        if self.hooks_active {
            let _ = writeln!(out, "Hooks appear to be active");
        } else {
            let _ = writeln!(out, "Hooks do not appear to be active");
        }
        out
    }
}

/// Create the target files in `dir` and probe them
pub fn run_selftest(interceptor: Option<&Interceptor>, dir: &Path) -> Result<SelfTestReport> {
    fs::create_dir_all(dir)?;

    let mut probes = Vec::with_capacity(TARGET_FILE_NAMES.len());
    for name in TARGET_FILE_NAMES {
        let path = dir.join(name);
        fs::write(&path, PROBE_CONTENT)?;
        probes.push(probe(interceptor, name, path));
    }

    // Delete is faked, so clean up whatever is still on disk
    for probe in &probes {
        let _ = fs::remove_file(&probe.path);
    }

    let hooks_active = probes.iter().all(|probe| !probe.exists);
    debug!("Self-test finished, hooks_active = {}", hooks_active);

    Ok(SelfTestReport {
        generated_at: Utc::now(),
        directory: dir.to_path_buf(),
        probes,
        hooks_active,
    })
}

/// Like [`run_selftest`], in a scratch directory removed afterwards
pub fn run_selftest_in_scratch_dir(interceptor: Option<&Interceptor>) -> Result<SelfTestReport> {
    let scratch = tempfile::Builder::new().prefix("file-redirect-selftest").tempdir()?;
    let report = run_selftest(interceptor, scratch.path())?;
    scratch.close()?;
    Ok(report)
}

fn probe(interceptor: Option<&Interceptor>, name: &str, path: PathBuf) -> FileProbe {
    let real_exists = || access(path.as_path(), AccessFlags::F_OK).is_ok();
    let real_length = || fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
    let real_delete = || fs::remove_file(&path).is_ok();
    let read_all = |target: &Path| {
        let mut content = Vec::new();
        File::open(target)
            .and_then(|mut file| file.read_to_end(&mut content))
            .unwrap_or(0)
    };

    let (exists, length, bytes_read, deleted) = match interceptor {
        Some(interceptor) => (
            interceptor.exists(&path, real_exists),
            interceptor.length(&path, real_length),
            interceptor.open_for_read(&path, read_all),
            interceptor.delete(&path, real_delete),
        ),
        None => (real_exists(), real_length(), read_all(path.as_path()), real_delete()),
    };

    FileProbe {
        name: name.to_string(),
        path,
        exists,
        length,
        bytes_read,
        deleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::TargetFileSet;
    use crate::substitute::TempFileProvider;
    use std::sync::Arc;

    #[test]
    fn test_module_info_lists_targets() {
        let info = module_info(&RedirectPolicy::builtin());
        assert!(info.contains("mrpcs-android-l.gr_925.data"));
        assert!(info.contains("mrpcs-android-1.gr_925.data"));
        assert!(info.contains("gr_925.data"));
    }

    #[test]
    fn test_selftest_through_interceptor() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RedirectPolicy::new(TargetFileSet::builtin(), TempFileProvider::in_dir(dir.path()));
        let interceptor = Interceptor::new(Arc::new(policy));

        let report = run_selftest(Some(&interceptor), &dir.path().join("probe")).unwrap();
        assert!(report.hooks_active);
        assert_eq!(report.probes.len(), 2);
        assert!(report.probes.iter().all(FileProbe::redirected));
        assert!(report.render().contains("Hooks appear to be active"));
    }

    #[test]
    fn test_selftest_without_hooks() {
        let dir = tempfile::tempdir().unwrap();

        let report = run_selftest(None, dir.path()).unwrap();
        assert!(!report.hooks_active);
        for probe in &report.probes {
            assert!(probe.exists);
            assert_eq!(probe.length, PROBE_CONTENT.len() as u64);
            assert_eq!(probe.bytes_read, PROBE_CONTENT.len());
            assert!(probe.deleted);
            assert!(!probe.redirected());
        }
    }

    #[test]
    fn test_scratch_dir_is_removed() {
        let report = run_selftest_in_scratch_dir(None).unwrap();
        assert_eq!(report.probes.len(), 2);
        assert!(!report.directory.exists());
    }

    #[test]
    fn test_report_serializes() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_selftest(None, dir.path()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["hooks_active"], false);
        assert_eq!(json["probes"].as_array().unwrap().len(), 2);
    }
}
