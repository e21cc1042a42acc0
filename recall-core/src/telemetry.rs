//! Logging setup.
//!
//! The library only emits `tracing` events; binaries and tests that want to
//! see them call [`init_tracing`] once at startup.

use tracing_subscriber::EnvFilter;

use crate::config::GeneralConfig;

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Returns `false` if a
/// subscriber was already installed (the call is then a no-op).
pub fn init_tracing(config: &GeneralConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.json_logs {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
