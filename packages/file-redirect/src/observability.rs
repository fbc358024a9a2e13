// packages/file-redirect/src/observability.rs
//! Logging setup
//!
//! `RUST_LOG` takes precedence over the configured level. Output goes to
//! stderr so the shim never mixes with a hooked program's stdout.
//! Override counters are emitted through the `metrics` facade as
//! `file_redirect_overrides_total{operation}`; they are dropped unless the
//! host installs a recorder.

use crate::utils::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (for example by a
/// host process that embeds the shim), in which case that one is kept.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init(),
    };

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        let config = LoggingConfig::default();
        // Another test may have installed one already; either way the
        // second call must not replace it
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
