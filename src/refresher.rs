use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::engine::RiskEngine;

/// Handle to a spawned background refresher. Dropping it does not stop the
/// task; call `shutdown` (or `shutdown().await`) explicitly, mirroring the
/// teacher's `tokio::signal::ctrl_c` shutdown style in `main.rs`.
pub struct RefresherHandle {
    stop_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl RefresherHandle {
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

/// Spawns the task that periodically recomputes the correlation matrix from
/// each symbol's return history, per §4.8 of the engine's design: this is the
/// only component in the crate allowed to `.await`.
pub fn spawn_background_refresher(engine: Arc<RiskEngine>, period: Duration) -> RefresherHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let mut ticker = tokio::time::interval(period);

    let task = tokio::spawn(async move {
        info!(?period, "background correlation refresher started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let updated = engine.refresh();
                    debug!(updated, "refresh pass complete (correlations + portfolio VaR)");
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("background correlation refresher stopped");
    });

    RefresherHandle { stop_tx, task }
}
