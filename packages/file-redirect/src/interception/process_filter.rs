// packages/file-redirect/src/interception/process_filter.rs
//! Decides whether the interception layer attaches to the current process
//!
//! The shim may be preloaded into every process of a session; only processes
//! named in `attach.processes` get their calls redirected. An empty list
//! attaches everywhere.

use crate::utils::config::AttachConfig;
use std::path::Path;
use tracing::debug;

/// Process name allow-list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessFilter {
    allowed: Vec<String>,
}

impl ProcessFilter {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// Attach to every process
    pub fn any() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AttachConfig) -> Self {
        Self::new(config.processes.clone())
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Check one process name against the allow-list
    pub fn should_attach(&self, process_name: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|allowed| allowed == process_name)
    }

    /// Check the running process under any of its names
    pub fn attaches_to_current(&self) -> bool {
        if self.allowed.is_empty() {
            return true;
        }

        let names = current_process_names();
        let attach = names.iter().any(|name| self.should_attach(name));
        debug!("Process names {:?}, attach = {}", names, attach);
        attach
    }
}

/// Names the current process is known by: the kernel `comm` value
/// (truncated to 15 bytes) and the basename of `argv[0]`.
pub fn current_process_names() -> Vec<String> {
    let mut names = Vec::with_capacity(2);

    #[cfg(target_os = "linux")]
    if let Ok(comm) = std::fs::read_to_string("/proc/self/comm") {
        let comm = comm.trim_end_matches('\n');
        if !comm.is_empty() {
            names.push(comm.to_string());
        }
    }

    if let Some(argv0) = std::env::args_os().next() {
        if let Some(base) = Path::new(&argv0).file_name().and_then(|name| name.to_str()) {
            if !names.iter().any(|known| known == base) {
                names.push(base.to_string());
            }
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_attaches_everywhere() {
        let filter = ProcessFilter::any();
        assert!(filter.should_attach("anything"));
        assert!(filter.attaches_to_current());
    }

    #[test]
    fn test_allow_list() {
        let filter = ProcessFilter::new(vec!["game".to_string(), "testapp".to_string()]);
        assert!(filter.should_attach("game"));
        assert!(filter.should_attach("testapp"));
        assert!(!filter.should_attach("gam"));
        assert!(!filter.should_attach("shell"));
    }

    #[test]
    fn test_current_process_has_a_name() {
        let names = current_process_names();
        assert!(!names.is_empty());

        let filter = ProcessFilter::new(vec![names[0].clone()]);
        assert!(filter.attaches_to_current());

        let filter = ProcessFilter::new(vec!["definitely-not-this-process".to_string()]);
        assert!(!filter.attaches_to_current());
    }

    #[test]
    fn test_from_config() {
        let config = AttachConfig {
            processes: vec!["testapp".to_string()],
        };
        let filter = ProcessFilter::from_config(&config);
        assert_eq!(filter.allowed(), ["testapp".to_string()]);
    }
}
