use anyhow::Context;
use imgflow_api::telemetry::{init_telemetry, LogFormat};
use imgflow_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env().context("Configuration validation failed")?;

    let log_format: LogFormat = config.log_format().parse()?;
    init_telemetry(log_format)?;
    tracing::info!(environment = %config.environment(), "Configuration loaded and validated");

    let (_state, router) = imgflow_api::setup::initialize_app(config.clone()).await?;

    imgflow_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
