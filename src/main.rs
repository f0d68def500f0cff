use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use risk_analytics_core::config::RiskEngineConfig;
use risk_analytics_core::engine::RiskEngine;
use risk_analytics_core::refresher::spawn_background_refresher;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("starting real-time portfolio risk analytics core");

    let engine = Arc::new(RiskEngine::new(RiskEngineConfig::default())?);

    run_demo(&engine)?;

    let refresher = spawn_background_refresher(Arc::clone(&engine), Duration::from_secs(1));

    info!("risk engine running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    refresher.shutdown().await;
    Ok(())
}

fn run_demo(engine: &RiskEngine) -> Result<()> {
    for day in 0..40 {
        let drift = 0.001 * (day as f64 % 7.0 - 3.0);
        engine.ingest_return(0, drift - 0.01)?;
        engine.ingest_return(1, drift + 0.008)?;
    }
    engine.update_position(0, 500.0, 50_000.0, 0.6)?;
    engine.update_position(1, -200.0, -20_000.0, -0.3)?;

    let result = engine.check();
    info!(?result, "initial risk check");
    Ok(())
}
