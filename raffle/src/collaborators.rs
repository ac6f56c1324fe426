//! Contracts the raffle consumes from the outside world.
//!
//! The raffle never reaches for a global clock, a randomness source or a
//! payment rail directly; each is handed in at construction and called at a
//! well-defined step of the lifecycle.

use std::time::{SystemTime, UNIX_EPOCH};

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::state::{RequestId, UnixTimestamp};

/// Parameters of one randomness request, forwarded verbatim to the coordinator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomWordsRequest {
    pub gas_lane: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Reasons a coordinator refuses a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("invalid subscription {0}")]
    InvalidSubscription(u64),
    #[error("num_words {requested} exceeds maximum {max}")]
    NumWordsTooLarge { requested: u32, max: u32 },
    #[error("request counter overflow")]
    CounterOverflow,
    #[error("coordinator unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a payout could not be delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("recipient {0} rejected the transfer")]
    Rejected(Pubkey),
    #[error("recipient {0} balance would overflow")]
    Overflow(Pubkey),
    #[error("payment rail unavailable: {0}")]
    Unavailable(String),
}

/// First half of the two-phase randomness protocol.
///
/// `request_random_words` returns a correlation id immediately; the answer
/// arrives later, out of band, through [`Raffle::fulfill`](crate::Raffle::fulfill).
pub trait RandomnessOracle {
    fn request_random_words(&mut self, request: RandomWordsRequest)
        -> Result<RequestId, OracleError>;
}

/// Moves value out of the pool to a recipient.
pub trait ValueTransfer {
    fn transfer(&mut self, to: &Pubkey, amount: u64) -> Result<(), TransferError>;
}

/// Source of the current time.
pub trait Clock {
    fn unix_timestamp(&self) -> UnixTimestamp;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> UnixTimestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as UnixTimestamp)
            .unwrap_or_default()
    }
}

impl<F> Clock for F
where
    F: Fn() -> UnixTimestamp,
{
    fn unix_timestamp(&self) -> UnixTimestamp {
        self()
    }
}
