//! Logging setup.
//!
//! `RUST_LOG` wins over the configured level so operators can raise
//! verbosity for one module without editing the config file.

use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};

/// Install the global `tracing` subscriber.
pub fn init_logging(default_level: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| AppError::Telemetry(format!("Failed to install subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        let first = init_logging("warn");
        let second = init_logging("warn");
        // Another test may have installed a subscriber first.
        assert!(first.is_err() || second.is_err());
    }
}
