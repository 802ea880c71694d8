//! Background job: evict issued dialback tokens older than the replay window.
//!
//! Runs every `DIALBACK_SWEEP_INTERVAL_MS` (default one minute). A record
//! created while a pass is running is picked up by a later pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use crate::clock::Clock;
use crate::protocol::REPLAY_WINDOW_MS;
use crate::errors::StoreError;
use crate::store::TokenStore;

/// Spawn the periodic sweeper. Call this once at startup.
pub fn spawn(store: TokenStore, clock: Arc<dyn Clock>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = run_once(&store, clock.as_ref()).await {
                tracing::error!("dialback sweep failed: {}", e);
            }
        }
    })
}

/// One eviction pass. Returns the number of evicted records.
pub async fn run_once(store: &TokenStore, clock: &dyn Clock) -> Result<usize, StoreError> {
    let evicted = store.sweep(clock.now_ms(), REPLAY_WINDOW_MS).await?;
    if evicted > 0 {
        tracing::info!(evicted, "evicted expired dialback tokens");
    }
    Ok(evicted)
}
