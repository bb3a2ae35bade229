use tracing::subscriber::set_global_default;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::error::{Error, Result};

// env_filter = trace|debug|info|warn|error|off
pub fn get_subscriber(env_filter: &str) -> impl tracing::Subscriber + Send + Sync {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter)))
        .with(fmt::layer().with_thread_names(true))
}

/// Installs `subscriber` globally and routes `log` records (eframe, winit) into it.
pub fn init_subscriber(subscriber: impl tracing::Subscriber + Send + Sync) -> Result<()> {
    tracing_log::LogTracer::init().map_err(|err| Error::Telemetry(err.to_string()))?;
    set_global_default(subscriber).map_err(|err| Error::Telemetry(err.to_string()))?;
    Ok(())
}
