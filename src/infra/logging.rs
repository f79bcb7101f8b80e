//! Logging bootstrap for the relay binary: a stderr fmt subscriber whose
//! filter comes from `RUST_LOG` when set, else the configured level.

use tracing_subscriber::EnvFilter;

use crate::infra::{config::LogConfig, error::AppError};

pub fn init(config: &LogConfig) -> Result<(), AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(AppError::LoggingInit)
}
