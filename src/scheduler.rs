//! Background symbol directory refresh

use crate::resolver::SymbolResolver;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Spawns the recurring directory refresh
///
/// The first refresh runs one `period` after the call; the startup refresh is
/// the caller's job. A failed refresh keeps the current snapshot and the loop
/// carries on. Abort the returned handle to stop it.
pub fn spawn_symbol_refresh(resolver: Arc<SymbolResolver>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            refresh_interval_secs = period.as_secs(),
            "Starting symbol directory refresh task"
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match resolver.refresh().await {
                Ok(loaded) => tracing::debug!(loaded, "Scheduled symbol refresh done"),
                Err(e) => tracing::warn!(
                    error = %e,
                    "Scheduled symbol refresh failed, keeping previous mappings"
                ),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::mock::{mapping, MockDirectory};
    use tokio::time::sleep;

    const PERIOD: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_every_period() {
        let directory = Arc::new(MockDirectory::new(vec![mapping("bitcoin", "btc", "Bitcoin")]));
        let resolver = Arc::new(SymbolResolver::in_memory(directory.clone()));
        let handle = spawn_symbol_refresh(resolver.clone(), PERIOD);

        sleep(PERIOD / 2).await;
        assert_eq!(directory.call_count(), 0);

        sleep(PERIOD).await;
        assert_eq!(directory.call_count(), 1);
        assert_eq!(resolver.resolve("BTC").await.unwrap(), "bitcoin");

        sleep(PERIOD).await;
        assert_eq!(directory.call_count(), 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_keep_the_loop_alive() {
        let directory = Arc::new(MockDirectory::new(vec![mapping("bitcoin", "btc", "Bitcoin")]));
        let resolver = Arc::new(SymbolResolver::in_memory(directory.clone()));
        resolver.refresh().await.unwrap();

        directory.set_listing(Err(ProviderError::RateLimitExceeded));
        let handle = spawn_symbol_refresh(resolver.clone(), PERIOD);

        sleep(PERIOD * 2 + PERIOD / 2).await;
        assert_eq!(directory.call_count(), 3);
        assert_eq!(resolver.resolve("btc").await.unwrap(), "bitcoin");
        assert!(!handle.is_finished());

        handle.abort();
    }
}
