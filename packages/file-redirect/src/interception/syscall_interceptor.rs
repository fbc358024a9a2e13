// packages/file-redirect/src/interception/syscall_interceptor.rs
//! Locates the LD_PRELOAD shim and builds the environment for child processes
//!
//! The shim is this crate built as a `cdylib` with the `preload` feature.
//! Children inherit it through `LD_PRELOAD`; any value already present is
//! kept after ours.

use crate::utils::config::{PreloadConfig, CONFIG_PATH_ENV};
use crate::utils::errors::{RedirectError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the shim library
pub const LIBRARY_NAME: &str = "libfile_redirect.so";

const PRELOAD_ENV: &str = "LD_PRELOAD";

/// Syscall interceptor (Linux only)
#[derive(Debug, Clone, Default)]
pub struct SyscallInterceptor {
    /// Explicit shim location; searched for when unset
    library_path: Option<PathBuf>,

    /// Configuration file handed down to the shim
    config_path: Option<PathBuf>,
}

impl SyscallInterceptor {
    pub fn new(config: &PreloadConfig) -> Self {
        Self {
            library_path: config.library_path.clone(),
            config_path: None,
        }
    }

    /// Use this shim library instead of searching for one
    pub fn with_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Point the shim in the child at this configuration file
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Find the preload library
    pub fn preload_library(&self) -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            if let Some(lib_path) = &self.library_path {
                return if lib_path.is_file() {
                    debug!("Using LD_PRELOAD library: {:?}", lib_path);
                    Ok(lib_path.clone())
                } else {
                    Err(RedirectError::HookUnavailable(format!(
                        "Preload library not found: {:?}",
                        lib_path
                    )))
                };
            }

            for candidate in candidate_paths() {
                if candidate.is_file() {
                    debug!("Found preload library at: {:?}", candidate);
                    return Ok(candidate);
                }
            }

            warn!("No preload library found");
            Err(RedirectError::HookUnavailable(format!(
                "{} not found; build it with `cargo build --release --features preload`",
                LIBRARY_NAME
            )))
        }

        #[cfg(not(target_os = "linux"))]
        {
            Err(RedirectError::HookUnavailable(
                "LD_PRELOAD interception is only supported on Linux".to_string(),
            ))
        }
    }

    /// Check if the shim can be injected
    pub fn is_available(&self) -> bool {
        self.preload_library().is_ok()
    }

    /// Environment variables for a child process.
    ///
    /// `existing_preload` is the `LD_PRELOAD` value the child would otherwise get.
    pub fn get_env_vars(&self, existing_preload: Option<&str>) -> Result<Vec<(String, String)>> {
        let library = self.preload_library()?;
        let mut env_vars = vec![(
            PRELOAD_ENV.to_string(),
            join_preload(&library, existing_preload),
        )];

        if let Some(config_path) = &self.config_path {
            env_vars.push((
                CONFIG_PATH_ENV.to_string(),
                config_path.to_string_lossy().to_string(),
            ));
        }

        Ok(env_vars)
    }
}

/// Prepend `library` to an existing `LD_PRELOAD` list, without duplicating it
fn join_preload(library: &Path, existing: Option<&str>) -> String {
    let library = library.to_string_lossy().to_string();

    let rest: Vec<&str> = existing
        .unwrap_or("")
        .split(|c: char| c == ':' || c.is_whitespace())
        .filter(|entry| !entry.is_empty() && *entry != library)
        .collect();

    if rest.is_empty() {
        library
    } else {
        format!("{}:{}", library, rest.join(":"))
    }
}

/// Standard locations, nearest first
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            paths.push(dir.join(LIBRARY_NAME));
            paths.push(dir.join("../lib/file-redirect").join(LIBRARY_NAME));
        }
    }

    paths.push(PathBuf::from("/usr/local/lib/file-redirect").join(LIBRARY_NAME));
    paths.push(PathBuf::from("/usr/lib/file-redirect").join(LIBRARY_NAME));
    paths.push(PathBuf::from("./target/release").join(LIBRARY_NAME));

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_preload() {
        let lib = Path::new("/opt/libfile_redirect.so");
        assert_eq!(join_preload(lib, None), "/opt/libfile_redirect.so");
        assert_eq!(join_preload(lib, Some("")), "/opt/libfile_redirect.so");
        assert_eq!(
            join_preload(lib, Some("/usr/lib/libother.so")),
            "/opt/libfile_redirect.so:/usr/lib/libother.so"
        );
        assert_eq!(
            join_preload(lib, Some("/opt/libfile_redirect.so /usr/lib/libother.so")),
            "/opt/libfile_redirect.so:/usr/lib/libother.so"
        );
    }

    #[test]
    fn test_missing_explicit_library() {
        let interceptor = SyscallInterceptor::default().with_library("/nonexistent/libfile_redirect.so");
        assert!(!interceptor.is_available());
        assert!(matches!(
            interceptor.preload_library(),
            Err(RedirectError::HookUnavailable(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_env_vars() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join(LIBRARY_NAME);
        std::fs::write(&lib, b"").unwrap();

        let interceptor = SyscallInterceptor::default()
            .with_library(&lib)
            .with_config_file("/etc/file-redirect.toml");
        let env_vars = interceptor.get_env_vars(Some("/usr/lib/libother.so")).unwrap();

        let preload = env_vars.iter().find(|(k, _)| k == "LD_PRELOAD").unwrap();
        assert!(preload.1.starts_with(lib.to_str().unwrap()));
        assert!(preload.1.ends_with(":/usr/lib/libother.so"));
        assert!(env_vars
            .iter()
            .any(|(k, v)| k == CONFIG_PATH_ENV && v == "/etc/file-redirect.toml"));
    }
}
