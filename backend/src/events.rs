//! Consumer of raffle observations.
//!
//! The raffle pushes every [`RaffleEvent`] into an unbounded channel; this
//! task drains it, logs each event and keeps the metrics current.

use std::sync::Arc;

use raffle::RaffleEvent;
use tokio::sync::mpsc;
use tracing::info;

use crate::metrics::Metrics;

/// Drain raffle events until the raffle (and its sender) is dropped.
pub async fn run_event_log(mut rx: mpsc::UnboundedReceiver<RaffleEvent>, metrics: Arc<Metrics>) {
    while let Some(event) = rx.recv().await {
        record_event(&event, &metrics);
    }
    info!("Event channel closed, shutting down");
}

fn record_event(event: &RaffleEvent, metrics: &Metrics) {
    match event {
        RaffleEvent::EntryAccepted { player } => {
            metrics.record_entry();
            info!(player = %player, "Received EntryAccepted event");
        }
        RaffleEvent::DrawRequested { request_id } => {
            metrics.record_draw();
            info!(request_id, "Received DrawRequested event");
        }
        RaffleEvent::WinnerPicked { winner, prize } => {
            metrics.record_winner(*prize);
            info!(winner = %winner, prize, "Received WinnerPicked event");
        }
    }
}
