use crate::config::AppConfig;
use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

pub fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_new(config.log_level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.is_production() {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_target(false)
            .try_init()
            .map_err(|err| anyhow::anyhow!("install json subscriber: {err}"))?;
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init()
            .map_err(|err| anyhow::anyhow!("install compact subscriber: {err}"))?;
    }

    tracing::debug!(
        app_env = %config.app_env,
        data_backend = %config.data_backend,
        sequence_backend = %config.sequence_backend,
        "tracing initialised"
    );
    Ok(())
}
