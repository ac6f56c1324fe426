//! Fulfillment engine: consumes queued randomness requests, derives the
//! random words and delivers them to the raffle as the coordinator.
//!
//! Delivery retries with exponential backoff when the raffle reports a
//! retryable failure (the payout rail refused the prize). Everything else
//! means the request is stale and is skipped.
//!
//! A request that exhausts its retries is parked rather than dropped: the
//! round keeps waiting for it, and an operator can push it back onto the
//! queue with [`redeliver`] (exposed as `POST /redeliver/{request_id}`).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use raffle::{RaffleError, RequestId, Settlement};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signer;
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info, instrument, warn};

use crate::SharedRaffle;
use crate::config::AppConfig;
use crate::coordinator::PendingRequest;
use crate::metrics::Metrics;
use crate::vrf::{compute_randomness, random_words};

/// Requests whose delivery gave up while the round still waits for them.
pub type ParkedRequests = Arc<Mutex<HashMap<RequestId, PendingRequest>>>;

/// Main fulfiller loop.
pub async fn run_fulfiller(
    config: AppConfig,
    mut rx: mpsc::Receiver<PendingRequest>,
    raffle: SharedRaffle,
    parked: ParkedRequests,
    pending_count: Arc<AtomicU64>,
    metrics: Arc<Metrics>,
) {
    while let Some(pending) = rx.recv().await {
        pending_count.fetch_add(1, Ordering::Relaxed);

        let cfg = config.clone();
        let raffle = raffle.clone();
        let parked = parked.clone();
        let in_flight = pending_count.clone();
        let met = metrics.clone();

        tokio::spawn(async move {
            info!(
                request_id = pending.request_id,
                num_words = pending.request.num_words,
                requested_at = pending.requested_at,
                "Fulfilling randomness request"
            );

            match fulfill_request(&cfg, &pending, &raffle).await {
                Ok(settlement) => {
                    let latency_ms = pending.queued_at.elapsed().as_millis() as u64;
                    met.record_fulfillment(latency_ms);
                    info!(
                        request_id = pending.request_id,
                        winner = %settlement.winner,
                        prize = settlement.prize,
                        latency_ms,
                        "Fulfilled successfully"
                    );
                }
                Err(e) => {
                    handle_fulfillment_error(pending.request_id, &e, &met);
                    if e.is_retryable() {
                        parked.lock().await.insert(pending.request_id, pending);
                    }
                }
            }

            in_flight.fetch_sub(1, Ordering::Relaxed);
        });
    }

    info!("Fulfiller channel closed, shutting down");
}

/// Move a parked request back onto the fulfiller queue.
///
/// Returns `Ok(false)` when nothing is parked under `request_id`.
pub async fn redeliver(
    parked: &ParkedRequests,
    tx: &mpsc::Sender<PendingRequest>,
    request_id: RequestId,
) -> anyhow::Result<bool> {
    let Some(pending) = parked.lock().await.remove(&request_id) else {
        return Ok(false);
    };

    if let Err(mpsc::error::SendError(pending)) = tx.send(pending).await {
        parked.lock().await.insert(request_id, pending);
        anyhow::bail!("fulfiller queue closed, request_id={request_id} stays parked");
    }

    info!(request_id, "Parked request redelivered");
    Ok(true)
}

fn handle_fulfillment_error(request_id: RequestId, error: &RaffleError, metrics: &Metrics) {
    if !error.is_retryable() {
        metrics.record_skip();
        warn!(
            request_id,
            reason = %error,
            "Skipping request (non-retryable)"
        );
    } else {
        metrics.record_failure();
        error!(
            request_id,
            error = %error,
            "Failed to fulfill, request parked and round remains calculating"
        );
    }
}

/// Derive the random words for `pending` and hand them to the raffle.
#[instrument(skip_all, fields(request_id = pending.request_id))]
async fn fulfill_request(
    config: &AppConfig,
    pending: &PendingRequest,
    raffle: &SharedRaffle,
) -> Result<Settlement, RaffleError> {
    let randomness = compute_randomness(&config.hmac_secret, pending);
    let words = random_words(&randomness, pending.request.num_words);

    deliver_with_retries(
        config,
        raffle,
        &config.coordinator_keypair.pubkey(),
        pending.request_id,
        &words,
    )
    .await
}

/// Call `fulfill` with exponential backoff on retryable errors.
async fn deliver_with_retries(
    config: &AppConfig,
    raffle: &SharedRaffle,
    coordinator: &Pubkey,
    request_id: RequestId,
    words: &[u64],
) -> Result<Settlement, RaffleError> {
    let attempts = config.max_retries.max(1);
    let mut retry_delay = Duration::from_millis(config.initial_retry_delay_ms);
    let mut attempt = 1;

    loop {
        let result = raffle.lock().await.fulfill(coordinator, request_id, words);
        match result {
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(
                    attempt,
                    delay = ?retry_delay,
                    error = %e,
                    "Delivery failed, retrying"
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay = retry_delay.saturating_mul(2).min(Duration::from_secs(60));
                attempt += 1;
            }
            other => return other,
        }
    }
}
