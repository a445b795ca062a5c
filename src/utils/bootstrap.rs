//! Bootstrap utilities for embedding the engine.
//!
//! Shared initialization code for whatever process hosts the circles core.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ConfigError, LOG_ENV_VAR};
use crate::error::EngineError;
use crate::facade::Circles;

/// Initialize tracing with the CIRCLES_LOG environment variable.
///
/// Defaults to "info" level if CIRCLES_LOG is not set. Calling it again once a
/// subscriber is installed does nothing.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Load configuration from `config_path` (plus the usual layers) and open an
/// engine on the system clock.
pub async fn open_engine(config_path: Option<&str>) -> Result<Circles, BootstrapError> {
    let config = Config::load(config_path)?;
    config.validate()?;
    info!(
        storage = %config.storage.path,
        monthly_fee = config.policy.fees.monthly_fee,
        "Opening circles engine"
    );
    Ok(Circles::builder(config).build().await?)
}
