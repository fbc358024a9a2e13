// packages/file-redirect/src/runtime/process_manager.rs
//! Process manager for running commands under the redirect shim
//!
//! Spawns a command with the shim's environment, waits for it, and forwards
//! Ctrl-C to the child as SIGTERM.

use crate::interception::SyscallInterceptor;
use crate::utils::errors::{RedirectError, Result};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Configuration for spawning a process
#[derive(Debug, Clone, Default)]
pub struct SpawnConfig {
    /// Program name or path
    pub program: String,

    /// Program arguments
    pub args: Vec<String>,

    /// Working directory
    pub work_dir: Option<PathBuf>,

    /// Extra environment variables
    pub env_vars: Vec<(String, String)>,
}

impl SpawnConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }
}

/// Process manager for shimmed child processes
pub struct ProcessManager {
    interceptor: SyscallInterceptor,
}

impl ProcessManager {
    pub fn new(interceptor: SyscallInterceptor) -> Self {
        Self { interceptor }
    }

    /// Find executable for a program name
    fn find_executable(&self, program: &str) -> Result<PathBuf> {
        which::which(program).map_err(|e| {
            RedirectError::LaunchFailed(format!("Executable '{}' not found in PATH: {}", program, e))
        })
    }

    /// Spawn a process with the shim preloaded
    pub fn spawn(&self, config: SpawnConfig) -> Result<Child> {
        let executable = self.find_executable(&config.program)?;
        let existing = std::env::var("LD_PRELOAD").ok();
        let shim_env = self.interceptor.get_env_vars(existing.as_deref())?;

        debug!("Spawning {:?} with args {:?}", executable, config.args);

        let mut command = Command::new(&executable);
        command.args(&config.args);

        if let Some(work_dir) = &config.work_dir {
            command.current_dir(work_dir);
        }

        for (key, value) in config.env_vars.iter().chain(shim_env.iter()) {
            command.env(key, value);
        }

        // The child talks to the terminal directly
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = command
            .spawn()
            .map_err(|e| RedirectError::LaunchFailed(format!("Failed to spawn {:?}: {}", executable, e)))?;

        info!("Process spawned with PID: {:?}", child.id());

        Ok(child)
    }

    /// Spawn, wait for exit, and forward Ctrl-C to the child
    pub async fn run(&self, config: SpawnConfig) -> Result<ExitStatus> {
        let mut child = self.spawn(config)?;

        tokio::select! {
            status = child.wait() => Ok(status?),
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt, stopping child");
                if let Some(pid) = child.id() {
                    self.kill(pid).await?;
                }
                Ok(child.wait().await?)
            }
        }
    }

    /// Kill a process by PID
    pub async fn kill(&self, pid: u32) -> Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let target = Pid::from_raw(pid as i32);

        // Try SIGTERM first (graceful)
        debug!("Sending SIGTERM to PID {}", target);
        kill(target, Signal::SIGTERM)
            .map_err(|e| RedirectError::LaunchFailed(format!("Failed to send SIGTERM: {}", e)))?;

        tokio::time::sleep(Duration::from_secs(2)).await;

        // Check if still alive, send SIGKILL
        if self.is_running(pid) {
            warn!("Process still alive, sending SIGKILL to PID {}", target);
            kill(target, Signal::SIGKILL)
                .map_err(|e| RedirectError::LaunchFailed(format!("Failed to send SIGKILL: {}", e)))?;
        }

        Ok(())
    }

    /// Check if a process is running (an unreaped child still counts)
    pub fn is_running(&self, pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), None).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interception::syscall_interceptor::LIBRARY_NAME;
    use std::os::unix::process::ExitStatusExt;

    fn manager_with_fake_library(dir: &std::path::Path) -> ProcessManager {
        let lib = dir.join(LIBRARY_NAME);
        std::fs::write(&lib, b"").unwrap();
        ProcessManager::new(SyscallInterceptor::default().with_library(lib))
    }

    #[test]
    fn test_spawn_config_builder() {
        let config = SpawnConfig::new("ls")
            .with_args(vec!["-l".to_string()])
            .with_env("KEY", "value");
        assert_eq!(config.program, "ls");
        assert_eq!(config.args, vec!["-l"]);
        assert_eq!(config.env_vars, vec![("KEY".to_string(), "value".to_string())]);
    }

    #[test]
    fn test_unknown_program() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_fake_library(dir.path());
        let result = manager.spawn(SpawnConfig::new("definitely-not-a-real-program-xyz"));
        assert!(matches!(result, Err(RedirectError::LaunchFailed(_))));
    }

    #[test]
    fn test_missing_library() {
        let manager = ProcessManager::new(
            SyscallInterceptor::default().with_library("/nonexistent/libfile_redirect.so"),
        );
        let result = manager.spawn(SpawnConfig::new("sh"));
        assert!(matches!(result, Err(RedirectError::HookUnavailable(_))));
    }

    #[tokio::test]
    async fn test_run_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_fake_library(dir.path());

        // An empty file in LD_PRELOAD is reported by the loader and skipped
        let config = SpawnConfig::new("sh").with_args(vec!["-c".to_string(), "exit 3".to_string()]);
        let status = manager.run(config).await.unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn test_kill_terminates_child() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_fake_library(dir.path());

        let config = SpawnConfig::new("sleep").with_args(vec!["30".to_string()]);
        let mut child = manager.spawn(config).unwrap();
        let pid = child.id().unwrap();
        assert!(manager.is_running(pid));

        manager.kill(pid).await.unwrap();
        let status = child.wait().await.unwrap();

        assert_eq!(status.signal(), Some(libc::SIGTERM));
        assert!(!manager.is_running(pid));
    }
}
