// packages/file-redirect/src/main.rs
//! File Redirect launcher
//!
//! Runs programs with the redirect shim preloaded, and offers a few
//! commands for checking what the shim will do.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use file_redirect::interception::SyscallInterceptor;
use file_redirect::observability::init_tracing;
use file_redirect::policy::{FileOperation, HookPhase};
use file_redirect::runtime::{ProcessManager, SpawnConfig};
use file_redirect::selftest::{module_info, run_selftest, run_selftest_in_scratch_dir};
use file_redirect::{BuildInfo, Interceptor, RedirectConfig, RedirectPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(
    name = "file-redirect",
    version,
    about = "Make gr_925.data files look absent and empty to a program"
)]
struct Cli {
    /// Configuration file (defaults to $FILE_REDIRECT_CONFIG, then ./file-redirect.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe the intercepted operations and target files
    Info {
        /// Print build information as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the override each operation gets for the given paths
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Only this operation (exists, open, length, delete)
        #[arg(short, long)]
        operation: Option<FileOperation>,
    },
    /// Create the target files and probe them
    Selftest {
        /// Directory to create the files in (a removed scratch dir by default)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Use plain libc calls instead of the in-process hooks
        #[arg(long)]
        raw: bool,
    },
    /// Run a command with the shim preloaded
    Run {
        /// Shim library to preload
        #[arg(short, long)]
        library: Option<PathBuf>,
        /// Command and its arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RedirectConfig::load_from(Some(path.as_path())),
        None => RedirectConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config.logging);
    debug!("Configuration loaded: {:?}", config);

    let policy = Arc::new(RedirectPolicy::from_config(&config));

    match cli.command {
        Commands::Info { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&BuildInfo::current())?);
            } else {
                print!("{}", module_info(&policy));
            }
        }

        Commands::Check { paths, operation } => {
            let operations = match operation {
                Some(operation) => vec![operation],
                None => FileOperation::ALL.to_vec(),
            };

            for path in &paths {
                let verdict = if policy.targets().is_target_path(path) {
                    "target"
                } else {
                    "not a target"
                };
                println!("{}: {}", path.display(), verdict);

                for &operation in &operations {
                    let outcome = match policy.decide_path(operation, path) {
                        Some(value) => value.describe(),
                        None => "real result".to_string(),
                    };
                    println!("  {:<14} {:<7} {}", operation.as_str(), phase_label(operation), outcome);
                }
            }
        }

        Commands::Selftest { dir, json, raw } => {
            let interceptor = Interceptor::new(policy.clone());
            let hooks = if raw { None } else { Some(&interceptor) };

            let report = match dir {
                Some(dir) => run_selftest(hooks, &dir),
                None => run_selftest_in_scratch_dir(hooks),
            }
            .context("Self-test failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
        }

        Commands::Run { library, command } => {
            let mut interceptor = SyscallInterceptor::new(&config.preload);
            if let Some(library) = library {
                interceptor = interceptor.with_library(library);
            }
            if let Some(config_path) = &cli.config {
                interceptor = interceptor.with_config_file(config_path);
            }

            let mut command = command.into_iter();
            let program = command.next().context("No command given")?;
            let spawn = SpawnConfig::new(program).with_args(command);

            info!("Starting {} with the redirect shim", spawn.program);
            let status = ProcessManager::new(interceptor).run(spawn).await?;
            debug!("Child exited with {}", status);

            std::process::exit(exit_code(status));
        }
    }

    Ok(())
}

fn phase_label(operation: FileOperation) -> &'static str {
    match operation.phase() {
        HookPhase::Before => "before",
        HookPhase::After => "after",
    }
}

/// Shell-style exit code for a finished child
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}
