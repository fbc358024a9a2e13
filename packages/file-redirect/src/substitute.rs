// packages/file-redirect/src/substitute.rs
//! Empty stand-ins for redirected reads
//!
//! A read of a target file is pointed at a substitute instead: a fresh
//! zero-byte temp file, or the null device when the temp file cannot be
//! created. Temp files are removed when their [`SubstituteSource`] is dropped.

use crate::utils::config::SubstituteConfig;
use crate::utils::errors::{RedirectError, Result};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// Path of the always-empty fallback substitute
pub const NULL_DEVICE: &str = "/dev/null";

/// What a substitute is backed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstituteKind {
    TempFile,
    NullDevice,
}

/// An empty resource to read from in place of a target file
pub struct SubstituteSource {
    kind: SubstituteKind,
    path: PathBuf,
    /// Deletes the temp file on drop
    temp: Option<TempPath>,
}

impl SubstituteSource {
    /// The null device substitute
    pub fn null_device() -> Self {
        Self {
            kind: SubstituteKind::NullDevice,
            path: PathBuf::from(NULL_DEVICE),
            temp: None,
        }
    }

    /// Wrap a temp file; it is deleted when the substitute is dropped
    pub fn temp_file(temp: TempPath) -> Self {
        Self {
            kind: SubstituteKind::TempFile,
            path: temp.to_path_buf(),
            temp: Some(temp),
        }
    }

    pub fn kind(&self) -> SubstituteKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the substitute read-only
    pub fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }

    /// Keep the temp file on disk past the lifetime of this value
    pub fn persist(mut self) -> PathBuf {
        if let Some(temp) = self.temp.take() {
            // keep() only fails on Windows-style sharing errors
            let _ = temp.keep();
        }
        self.path.clone()
    }
}

impl fmt::Debug for SubstituteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubstituteSource")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .finish()
    }
}

impl PartialEq for SubstituteSource {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.path == other.path
    }
}

impl Eq for SubstituteSource {}

/// Creates substitutes for redirected reads
pub trait SubstituteProvider: Send + Sync + fmt::Debug {
    fn create(&self) -> Result<SubstituteSource>;
}

/// Creates zero-byte temp files
#[derive(Debug, Clone)]
pub struct TempFileProvider {
    dir: Option<PathBuf>,
    prefix: String,
    suffix: String,
}

impl TempFileProvider {
    /// Temp files named `redirect_*.tmp` in the system temp directory
    pub fn new() -> Self {
        Self::from_config(&SubstituteConfig::default())
    }

    pub fn from_config(config: &SubstituteConfig) -> Self {
        Self {
            dir: config.temp_dir.clone(),
            prefix: config.prefix.clone(),
            suffix: config.suffix.clone(),
        }
    }

    /// Create temp files under `dir` instead of the system temp directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::new()
        }
    }
}

impl Default for TempFileProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SubstituteProvider for TempFileProvider {
    fn create(&self) -> Result<SubstituteSource> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix).suffix(&self.suffix);

        let file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| RedirectError::SubstituteResourceCreationFailed(e.to_string()))?;

        let temp = file.into_temp_path();
        debug!("Created substitute temp file {:?}", temp);

        Ok(SubstituteSource::temp_file(temp))
    }
}

/// Always hands out the null device
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDeviceProvider;

impl SubstituteProvider for NullDeviceProvider {
    fn create(&self) -> Result<SubstituteSource> {
        Ok(SubstituteSource::null_device())
    }
}
