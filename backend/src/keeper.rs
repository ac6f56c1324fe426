//! Keeper loop: polls the upkeep predicate and starts draws.
//!
//! `perform_upkeep` re-validates eligibility itself, so a poll that races
//! with another caller only ever sees `UpkeepNotNeeded`.

use std::sync::Arc;
use std::time::Duration;

use raffle::{RaffleError, RequestId};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::SharedRaffle;
use crate::metrics::Metrics;

/// Poll the raffle forever at `poll_interval`.
pub async fn run_keeper(raffle: SharedRaffle, poll_interval: Duration, metrics: Arc<Metrics>) {
    info!(poll_ms = poll_interval.as_millis() as u64, "Keeper started");

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        poll_once(&raffle, &metrics).await;
    }
}

/// One keeper step. Returns the request id when a draw was started.
pub async fn poll_once(raffle: &SharedRaffle, metrics: &Metrics) -> Option<RequestId> {
    let mut raffle = raffle.lock().await;
    if !raffle.check_upkeep() {
        return None;
    }

    match raffle.perform_upkeep() {
        Ok(request_id) => {
            info!(request_id, "Keeper started a draw");
            Some(request_id)
        }
        Err(RaffleError::UpkeepNotNeeded { balance, players, state }) => {
            debug!(balance, players, %state, "Upkeep no longer needed");
            None
        }
        Err(e) => {
            metrics.record_keeper_error();
            error!(error = %e, "perform_upkeep failed");
            None
        }
    }
}
