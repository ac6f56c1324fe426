//! In-process randomness coordinator.
//!
//! Accepts requests from the raffle, validates them against the configured
//! subscription, allocates monotonically increasing request ids (starting at
//! 1) and queues each request for the fulfiller. The answer travels back to
//! the raffle separately, through `Raffle::fulfill`.

use std::time::Instant;

use raffle::{
    Clock, OracleError, RandomWordsRequest, RandomnessOracle, RequestId, SystemClock,
    UnixTimestamp,
};
use tokio::sync::mpsc;
use tracing::info;

/// A request waiting for the fulfiller.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub request: RandomWordsRequest,
    /// Wall-clock time of the request, mixed into the VRF input.
    pub requested_at: UnixTimestamp,
    /// Used for fulfillment latency.
    pub queued_at: Instant,
}

/// Coordinator that hands requests to the fulfiller over a channel.
pub struct ChannelCoordinator {
    subscription_id: u64,
    max_num_words: u32,
    request_counter: RequestId,
    tx: mpsc::Sender<PendingRequest>,
}

impl ChannelCoordinator {
    pub fn new(subscription_id: u64, max_num_words: u32, tx: mpsc::Sender<PendingRequest>) -> Self {
        Self {
            subscription_id,
            max_num_words,
            request_counter: 0,
            tx,
        }
    }

    /// Id of the most recently accepted request, 0 before the first one.
    pub fn request_counter(&self) -> RequestId {
        self.request_counter
    }
}

impl RandomnessOracle for ChannelCoordinator {
    fn request_random_words(
        &mut self,
        request: RandomWordsRequest,
    ) -> Result<RequestId, OracleError> {
        if request.subscription_id != self.subscription_id {
            return Err(OracleError::InvalidSubscription(request.subscription_id));
        }
        if request.num_words == 0 || request.num_words > self.max_num_words {
            return Err(OracleError::NumWordsTooLarge {
                requested: request.num_words,
                max: self.max_num_words,
            });
        }

        let request_id = self
            .request_counter
            .checked_add(1)
            .ok_or(OracleError::CounterOverflow)?;

        let pending = PendingRequest {
            request_id,
            request,
            requested_at: SystemClock.unix_timestamp(),
            queued_at: Instant::now(),
        };
        self.tx
            .try_send(pending)
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        self.request_counter = request_id;

        info!(
            request_id,
            subscription_id = request.subscription_id,
            num_words = request.num_words,
            callback_gas_limit = request.callback_gas_limit,
            confirmations = request.request_confirmations,
            "Queued randomness request"
        );
        Ok(request_id)
    }
}
