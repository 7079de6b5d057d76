//! Auto-refund scheduler
//!
//! Runs the sweep on an independent timer. Overlapping runs are safe: the
//! state transition is idempotent per transaction, so a transaction is
//! auto-refunded at most once no matter how sweeps interleave.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::lifecycle::engine::TransactionLifecycle;

/// Spawn the periodic auto-refund sweep on the current tokio runtime.
///
/// The interval comes from `config.lifecycle.sweep_interval` (60 s by
/// default). Abort the returned handle to stop the sweeper.
pub fn spawn_auto_refund_task(lifecycle: Arc<TransactionLifecycle>) -> JoinHandle<()> {
    let period = lifecycle.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let result = lifecycle.sweep_auto_refunds();
            debug!(
                examined = result.examined,
                refunded = result.refunded,
                "auto-refund sweep tick"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    // The sweep itself is covered by the lifecycle tests; here we only
    // check that the task runs it on the timer using tokio's paused time.
    use super::*;
    use crate::config::PipelineConfig;
    use crate::core::time::SystemClock;
    use crate::decision::DecisionEngine;
    use crate::events::EventBus;
    use crate::lifecycle::database::Database;
    use crate::store::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_ticks_without_work() {
        let clock = Arc::new(SystemClock);
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let config = Arc::new(PipelineConfig::default());
        let decision = DecisionEngine::new(store, clock.clone(), Vec::new(), config.clone());
        let lifecycle = Arc::new(TransactionLifecycle::new(
            Database::new(),
            decision,
            clock,
            Arc::new(EventBus::new()),
            config,
        ));

        let handle = spawn_auto_refund_task(lifecycle);
        // Two sweep periods of virtual time; the task must stay alive
        tokio::time::sleep(std::time::Duration::from_secs(130)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
