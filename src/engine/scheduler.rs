use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use super::TradingEngine;

/// Run `job` every `period` until the shutdown flag flips to true
async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("{} loop started (every {:?})", name, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => job().await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("{} loop stopped", name);
}

impl TradingEngine {
    /// Spawn the decision, monitor and reaper loops.
    ///
    /// Send `true` on the shutdown channel (or drop the sender) to stop them.
    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let decision = {
            let engine = Arc::clone(self);
            let period = Duration::from_secs(self.config.tick_interval_secs.max(1));
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                run_periodic("💹 [DECISION]", period, shutdown, || {
                    let engine = engine.clone();
                    async move {
                        engine.run_tick().await;
                    }
                })
                .await
            })
        };

        let monitor = {
            let engine = Arc::clone(self);
            let period = Duration::from_secs(self.config.monitor_interval_secs.max(1));
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                run_periodic("📈 [MONITOR]", period, shutdown, || {
                    let engine = engine.clone();
                    async move {
                        engine.monitor_once().await;
                    }
                })
                .await
            })
        };

        let reaper = {
            let engine = Arc::clone(self);
            let period = Duration::from_secs(self.config.reaper_interval_secs.max(1));
            tokio::spawn(async move {
                run_periodic("🧹 [REAPER]", period, shutdown, || {
                    let engine = engine.clone();
                    async move {
                        engine.reap_once(Utc::now()).await;
                    }
                })
                .await
            })
        };

        vec![decision, monitor, reaper]
    }
}
