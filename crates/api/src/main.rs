//! Stress Pipeline - Main Entry Point

use anyhow::Context;
use api::{init_logging, load_config, run_server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    init_logging(config.server.log_format);

    info!("=== Stress Pipeline v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Model: {}, thresholds: moderate={} high={}, alert cooldown: {}s",
        config.model.model_path.display(),
        config.thresholds.moderate,
        config.thresholds.high,
        config.alert.cooldown_secs
    );

    run_server(config).await.context("Server terminated")?;

    Ok(())
}
