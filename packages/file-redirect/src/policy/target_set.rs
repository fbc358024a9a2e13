// packages/file-redirect/src/policy/target_set.rs
//! The fixed set of file names whose accesses are redirected
//!
//! A name is a target when it equals one of the literal names or contains
//! the `gr_925.data` marker anywhere. The substring rule already covers both
//! literals; the literal checks are kept so the exact names stay explicit.

use std::ffi::OsStr;
use std::path::Path;

/// Literal target names
pub const TARGET_FILE_NAMES: [&str; 2] = ["mrpcs-android-l.gr_925.data", "mrpcs-android-1.gr_925.data"];

/// Marker that makes any containing name a target
pub const TARGET_SUBSTRING: &str = "gr_925.data";

/// Immutable set of target names plus the substring rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFileSet {
    literals: Vec<&'static str>,
    substring: &'static str,
}

impl TargetFileSet {
    /// The compiled-in target set
    pub fn builtin() -> Self {
        Self {
            literals: TARGET_FILE_NAMES.to_vec(),
            substring: TARGET_SUBSTRING,
        }
    }

    /// Literal names in the set
    pub fn literals(&self) -> &[&'static str] {
        &self.literals
    }

    /// Substring that marks any name as a target
    pub fn substring(&self) -> &'static str {
        self.substring
    }

    /// Check a bare file name (no directory components)
    pub fn is_target(&self, file_name: &str) -> bool {
        self.literals.iter().any(|literal| *literal == file_name) || file_name.contains(self.substring)
    }

    /// Check the last component of a path.
    ///
    /// Non-UTF-8 names never match; paths without a final component
    /// (`/`, `..`) never match either.
    pub fn is_target_path(&self, path: &Path) -> bool {
        file_name_of(path).map_or(false, |name| self.is_target(name))
    }
}

impl Default for TargetFileSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Last path component as UTF-8, if any
pub fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(OsStr::to_str)
}
