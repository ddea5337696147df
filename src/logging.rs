use anyhow::{Context, Result};
use relexec_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Filter used by [`initialize_tracing`]. `RUST_LOG` takes precedence over
/// the configured level.
pub fn tracing_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return Ok(EnvFilter::from_default_env());
    }
    EnvFilter::try_new(config.level.trim())
        .with_context(|| format!("Invalid logging.level `{}`", config.level))
}

/// Installs a stderr subscriber. A subscriber that is already installed is
/// kept and a warning is emitted through it.
pub fn initialize_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_filter(config)?;
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();

    if let Err(err) = init_result {
        tracing::warn!(error = %err, "tracing already initialized; skipping relexec tracing setup");
    }

    Ok(())
}
