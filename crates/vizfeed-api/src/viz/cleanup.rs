use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::registry::VizRegistry;

/// Background task that drops viz sessions whose page stopped reporting.
///
/// Sweeps every `interval`; a session is stale once it has gone `ttl`
/// without a signal. Exits when `shutdown` is cancelled.
pub async fn run_sweep_loop(
    registry: VizRegistry,
    ttl: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let count = registry.sweep_stale(ttl).await;
        if count > 0 {
            info!("Viz sweep: dropped {} stale sessions", count);
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn loop_sweeps_and_stops_on_shutdown() {
        let registry = VizRegistry::new();
        let (_, cancel) = registry.mount(Uuid::new_v4()).await;
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run_sweep_loop(
            registry.clone(),
            Duration::ZERO,
            Duration::from_millis(10),
            shutdown.clone(),
        ));

        tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
            .await
            .unwrap();
        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(registry.len().await, 0);
    }
}
