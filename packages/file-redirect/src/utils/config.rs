// packages/file-redirect/src/utils/config.rs
//! Layered configuration for the shim and its launcher
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults
//! 2. The file named by `FILE_REDIRECT_CONFIG`, or `file-redirect.{toml,yaml,json}`
//!    in the working directory when present
//! 3. Environment variables such as `FILE_REDIRECT__LOGGING__LEVEL=debug`
//!
//! None of these affect which files are redirected; the target set is fixed.

use crate::utils::errors::{RedirectError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "FILE_REDIRECT_CONFIG";

/// Base name searched in the working directory
const DEFAULT_CONFIG_NAME: &str = "file-redirect";

const ENV_PREFIX: &str = "FILE_REDIRECT";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    pub logging: LoggingConfig,

    pub attach: AttachConfig,

    pub substitute: SubstituteConfig,

    pub preload: PreloadConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Which processes the interception layer attaches to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachConfig {
    /// Process names to attach to. Empty attaches to every process.
    pub processes: Vec<String>,
}

/// Where substitute temp files are created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstituteConfig {
    /// Directory for temp files (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,

    pub prefix: String,

    pub suffix: String,
}

impl Default for SubstituteConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            prefix: "redirect_".to_string(),
            suffix: ".tmp".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Explicit path to the shim library used by `run`
    pub library_path: Option<PathBuf>,
}

impl RedirectConfig {
    /// Load configuration from the standard sources
    pub fn load() -> Result<Self> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load_from(explicit.as_deref())
    }

    /// Load configuration, reading `path` instead of searching the working directory
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let builder = match path {
            Some(path) => Config::builder().add_source(File::from(path).required(true)),
            None => Config::builder().add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("attach.processes"),
            )
            .build()?;

        let config: RedirectConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break temp file creation or logging setup
    pub fn validate(&self) -> Result<()> {
        if self.logging.level.trim().is_empty() {
            return Err(RedirectError::ConfigError("logging.level cannot be empty".to_string()));
        }

        for (key, value) in [("substitute.prefix", &self.substitute.prefix), ("substitute.suffix", &self.substitute.suffix)] {
            if value.contains('/') || value.contains('\0') {
                return Err(RedirectError::ConfigError(format!(
                    "{} must not contain path separators: {:?}",
                    key, value
                )));
            }
        }

        if self.attach.processes.iter().any(|name| name.trim().is_empty()) {
            return Err(RedirectError::ConfigError(
                "attach.processes cannot contain empty names".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = RedirectConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.attach.processes.is_empty());
        assert_eq!(config.substitute.prefix, "redirect_");
        assert_eq!(config.substitute.suffix, ".tmp");
        assert!(config.preload.library_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "json"

[attach]
processes = ["game", "testapp"]

[substitute]
prefix = "stub_"
"#
        )
        .unwrap();

        let config = RedirectConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.attach.processes, vec!["game", "testapp"]);
        assert_eq!(config.substitute.prefix, "stub_");
        // Untouched keys keep their defaults
        assert_eq!(config.substitute.suffix, ".tmp");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = RedirectConfig::load_from(Some(Path::new("/nonexistent/file-redirect.toml")));
        assert!(matches!(result, Err(RedirectError::ConfigError(_))));
    }

    #[test]
    fn test_validation() {
        let invalid_prefix = RedirectConfig {
            substitute: SubstituteConfig {
                prefix: "../escape".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(invalid_prefix.validate().is_err());

        let invalid_level = RedirectConfig {
            logging: LoggingConfig {
                level: "  ".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(invalid_level.validate().is_err());

        let invalid_process = RedirectConfig {
            attach: AttachConfig {
                processes: vec!["".to_string()],
            },
            ..Default::default()
        };
        assert!(invalid_process.validate().is_err());
    }
}
