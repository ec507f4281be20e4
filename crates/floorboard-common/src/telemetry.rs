//! Tracing setup for floorboard tools.
//!
//! Console-only: pretty output filtered through `RUST_LOG` when set, a
//! build-appropriate default level otherwise.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for labeling (e.g. "floorboard-view").
    pub service_name: String,
    /// Console log level (default: INFO, DEBUG in debug builds).
    pub console_level: Level,
}

impl TelemetryConfig {
    /// Load config from the environment.
    ///
    /// `RUST_LOG` overrides `console_level` when present.
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            service_name: service_name.into(),
            console_level,
        }
    }
}

/// Initialize tracing. Call once at startup; later calls are no-ops.
pub fn init(config: TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    tracing::debug!(service = %config.service_name, "telemetry initialized");
}
