// packages/file-redirect/src/policy/engine.rs
//! Redirect policy engine
//!
//! Given an intercepted file operation and the file name it touches, decides
//! whether to replace the operation's outcome and with what. Decisions depend
//! on the file name only; the engine holds no mutable state and can be shared
//! across threads behind an `Arc`.
//!
//! | Operation     | Override for a target name          |
//! |---------------|-------------------------------------|
//! | `Exists`      | `false`                             |
//! | `OpenForRead` | read from an empty substitute       |
//! | `Length`      | `0`                                 |
//! | `Delete`      | `true`                              |

use crate::policy::target_set::{file_name_of, TargetFileSet};
use crate::substitute::{SubstituteProvider, SubstituteSource, TempFileProvider};
use crate::utils::config::RedirectConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// File-system operations the interception layer consults the policy for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    /// Existence check
    Exists,

    /// Opening a read stream, by path or by handle
    OpenForRead,

    /// Size query
    Length,

    /// Removal
    Delete,
}

impl FileOperation {
    pub const ALL: [FileOperation; 4] = [
        FileOperation::Exists,
        FileOperation::OpenForRead,
        FileOperation::Length,
        FileOperation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileOperation::Exists => "exists",
            FileOperation::OpenForRead => "open_for_read",
            FileOperation::Length => "length",
            FileOperation::Delete => "delete",
        }
    }

    /// When the override is applied relative to the real call
    pub fn phase(&self) -> HookPhase {
        match self {
            FileOperation::OpenForRead => HookPhase::Before,
            FileOperation::Exists | FileOperation::Length | FileOperation::Delete => HookPhase::After,
        }
    }
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "exists" => Ok(FileOperation::Exists),
            "open" | "open_for_read" | "read" => Ok(FileOperation::OpenForRead),
            "length" | "len" | "size" => Ok(FileOperation::Length),
            "delete" | "remove" | "unlink" => Ok(FileOperation::Delete),
            other => Err(format!(
                "unknown operation '{}' (expected exists, open, length or delete)",
                other
            )),
        }
    }
}

/// Hook placement relative to the real implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// Arguments are substituted before the real call runs
    Before,

    /// The real call runs and its result is replaced
    After,
}

/// Per-call match result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InterceptionDecision {
    pub is_target: bool,
}

/// Value returned in place of the real outcome
#[derive(Debug, PartialEq, Eq)]
pub enum OverrideValue {
    /// Result of an existence check
    Exists(bool),

    /// Result of a size query
    Length(u64),

    /// Result of a delete
    Deleted(bool),

    /// Read from this substitute instead of the real file
    OpenFrom(SubstituteSource),
}

impl OverrideValue {
    /// Short human-readable form for logs and the CLI
    pub fn describe(&self) -> String {
        match self {
            OverrideValue::Exists(exists) => format!("exists = {}", exists),
            OverrideValue::Length(len) => format!("length = {}", len),
            OverrideValue::Deleted(deleted) => format!("deleted = {}", deleted),
            OverrideValue::OpenFrom(source) => format!("read from {}", source.path().display()),
        }
    }
}

/// The redirect policy: target set plus substitute factory
#[derive(Debug)]
pub struct RedirectPolicy {
    targets: TargetFileSet,
    substitutes: Box<dyn SubstituteProvider>,
}

impl RedirectPolicy {
    pub fn new(targets: TargetFileSet, substitutes: impl SubstituteProvider + 'static) -> Self {
        Self {
            targets,
            substitutes: Box::new(substitutes),
        }
    }

    /// Built-in targets with temp files in the system temp directory
    pub fn builtin() -> Self {
        Self::new(TargetFileSet::builtin(), TempFileProvider::new())
    }

    pub fn from_config(config: &RedirectConfig) -> Self {
        Self::new(
            TargetFileSet::builtin(),
            TempFileProvider::from_config(&config.substitute),
        )
    }

    pub fn targets(&self) -> &TargetFileSet {
        &self.targets
    }

    /// Match a bare file name against the target set
    pub fn evaluate(&self, file_name: &str) -> InterceptionDecision {
        InterceptionDecision {
            is_target: self.targets.is_target(file_name),
        }
    }

    /// Decide the override for `operation` on `file_name`.
    ///
    /// `None` means the real outcome stands.
    pub fn decide(&self, operation: FileOperation, file_name: &str) -> Option<OverrideValue> {
        if !self.evaluate(file_name).is_target {
            return None;
        }

        let value = match operation {
            FileOperation::Exists => OverrideValue::Exists(false),
            FileOperation::OpenForRead => OverrideValue::OpenFrom(self.substitute()),
            FileOperation::Length => OverrideValue::Length(0),
            FileOperation::Delete => OverrideValue::Deleted(true),
        };

        Some(value)
    }

    /// Like [`decide`](Self::decide), taking the basename of `path`
    pub fn decide_path(&self, operation: FileOperation, path: &Path) -> Option<OverrideValue> {
        self.decide(operation, file_name_of(path)?)
    }

    /// Fresh substitute, falling back to the null device
    fn substitute(&self) -> SubstituteSource {
        match self.substitutes.create() {
            Ok(source) => source,
            Err(e) => {
                warn!("{}; falling back to null device", e);
                SubstituteSource::null_device()
            }
        }
    }
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substitute::{NullDeviceProvider, SubstituteKind};
    use crate::utils::errors::{RedirectError, Result};
    use proptest::prelude::*;
    use std::io::Read;

    #[derive(Debug)]
    struct FailingProvider;

    impl SubstituteProvider for FailingProvider {
        fn create(&self) -> Result<SubstituteSource> {
            Err(RedirectError::SubstituteResourceCreationFailed(
                "no space left on device".to_string(),
            ))
        }
    }

    fn policy() -> RedirectPolicy {
        RedirectPolicy::new(TargetFileSet::builtin(), NullDeviceProvider)
    }

    #[test]
    fn test_exists_is_false_for_literal() {
        assert_eq!(
            policy().decide(FileOperation::Exists, "mrpcs-android-l.gr_925.data"),
            Some(OverrideValue::Exists(false))
        );
    }

    #[test]
    fn test_length_is_zero_for_literal() {
        assert_eq!(
            policy().decide(FileOperation::Length, "mrpcs-android-1.gr_925.data"),
            Some(OverrideValue::Length(0))
        );
    }

    #[test]
    fn test_delete_matches_broad_substring() {
        assert_eq!(
            policy().decide(FileOperation::Delete, "foo_gr_925.data.bak"),
            Some(OverrideValue::Deleted(true))
        );
    }

    #[test]
    fn test_unrelated_name_has_no_override() {
        let policy = policy();
        for operation in FileOperation::ALL {
            assert_eq!(policy.decide(operation, "unrelated.data"), None);
        }
        assert_eq!(policy.decide(FileOperation::Exists, ""), None);
    }

    #[test]
    fn test_open_uses_empty_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RedirectPolicy::new(TargetFileSet::builtin(), TempFileProvider::in_dir(dir.path()));

        match policy.decide(FileOperation::OpenForRead, "mrpcs-android-l.gr_925.data") {
            Some(OverrideValue::OpenFrom(source)) => {
                assert_eq!(source.kind(), SubstituteKind::TempFile);
                let mut content = Vec::new();
                source.open().unwrap().read_to_end(&mut content).unwrap();
                assert!(content.is_empty());
            }
            other => panic!("expected substitute, got {:?}", other),
        }
    }

    #[test]
    fn test_open_falls_back_to_null_device() {
        let policy = RedirectPolicy::new(TargetFileSet::builtin(), FailingProvider);

        let value = policy.decide(FileOperation::OpenForRead, "mrpcs-android-1.gr_925.data");
        assert_eq!(value, Some(OverrideValue::OpenFrom(SubstituteSource::null_device())));

        if let Some(OverrideValue::OpenFrom(source)) = value {
            let mut content = Vec::new();
            source.open().unwrap().read_to_end(&mut content).unwrap();
            assert!(content.is_empty());
        }
    }

    #[test]
    fn test_unreachable_temp_dir_falls_back() {
        let policy = RedirectPolicy::new(
            TargetFileSet::builtin(),
            TempFileProvider::in_dir("/nonexistent/file-redirect"),
        );
        let value = policy.decide(FileOperation::OpenForRead, "x_gr_925.data");
        assert_eq!(value, Some(OverrideValue::OpenFrom(SubstituteSource::null_device())));
    }

    #[test]
    fn test_decide_path_uses_basename() {
        let policy = policy();
        assert_eq!(
            policy.decide_path(FileOperation::Exists, Path::new("/data/files/mrpcs-android-l.gr_925.data")),
            Some(OverrideValue::Exists(false))
        );
        assert_eq!(
            policy.decide_path(FileOperation::Exists, Path::new("/data/gr_925.data/plain.txt")),
            None
        );
        assert_eq!(policy.decide_path(FileOperation::Exists, Path::new("/")), None);
    }

    #[test]
    fn test_operation_phases() {
        assert_eq!(FileOperation::OpenForRead.phase(), HookPhase::Before);
        assert_eq!(FileOperation::Exists.phase(), HookPhase::After);
        assert_eq!(FileOperation::Length.phase(), HookPhase::After);
        assert_eq!(FileOperation::Delete.phase(), HookPhase::After);
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!("exists".parse::<FileOperation>().unwrap(), FileOperation::Exists);
        assert_eq!("open-for-read".parse::<FileOperation>().unwrap(), FileOperation::OpenForRead);
        assert_eq!("Open".parse::<FileOperation>().unwrap(), FileOperation::OpenForRead);
        assert_eq!("size".parse::<FileOperation>().unwrap(), FileOperation::Length);
        assert_eq!("unlink".parse::<FileOperation>().unwrap(), FileOperation::Delete);
        assert!("chmod".parse::<FileOperation>().is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(OverrideValue::Exists(false).describe(), "exists = false");
        assert_eq!(OverrideValue::Length(0).describe(), "length = 0");
        assert_eq!(
            OverrideValue::OpenFrom(SubstituteSource::null_device()).describe(),
            "read from /dev/null"
        );
    }

    fn any_operation() -> impl Strategy<Value = FileOperation> {
        prop::sample::select(FileOperation::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_override_iff_target(operation in any_operation(), name in "[a-z0-9_.-]{0,24}(gr_925\\.data)?[a-z0-9_.-]{0,8}") {
            let policy = policy();
            let is_target = policy.evaluate(&name).is_target;
            prop_assert_eq!(policy.decide(operation, &name).is_some(), is_target);
        }

        #[test]
        fn prop_decide_is_idempotent(operation in any_operation(), name in "[a-z0-9_.-]{0,24}(gr_925\\.data)?") {
            let policy = policy();
            prop_assert_eq!(policy.decide(operation, &name), policy.decide(operation, &name));
        }
    }
}
