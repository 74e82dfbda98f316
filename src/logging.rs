//! Structured logging setup.
//!
//! Logs go to stderr so stdout stays clean for command output. `RUST_LOG`
//! overrides the level from `[logging]` in the config file.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(atty::is(atty::Stream::Stderr)),
            )
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}
