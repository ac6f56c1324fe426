use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::ledger::EntryLedger;
use crate::tracker::RandomnessRequestTracker;

/// Seconds since the Unix epoch, as reported by the [`Clock`](crate::collaborators::Clock).
pub type UnixTimestamp = i64;

/// Correlation id handed out by the randomness coordinator for one request.
pub type RequestId = u64;

/// Block confirmations the coordinator waits for before answering a request.
pub const REQUEST_CONFIRMATIONS: u16 = 3;

/// Random words requested per draw. Only the first one picks the winner.
pub const NUM_WORDS: u32 = 1;

/// Lifecycle of the round.
///
/// `Open` accepts entries and permits a draw; `Calculating` rejects both and
/// waits for exactly one fulfillment of the pending request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaffleState {
    #[default]
    Open,
    Calculating,
}

impl std::fmt::Display for RaffleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RaffleState::Open => f.write_str("open"),
            RaffleState::Calculating => f.write_str("calculating"),
        }
    }
}

/// Immutable raffle parameters supplied at construction.
///
/// Nothing in the state machine mutates these. Subscription registration and
/// funding happen on the coordinator side; the raffle only forwards the id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Minimum stake (in lamports) accepted by `enter`.
    pub entrance_fee: u64,
    /// Minimum number of seconds between two draws.
    pub interval: i64,
    /// Key hash selecting the coordinator's price tier.
    pub gas_lane: [u8; 32],
    /// Coordinator subscription that pays for the randomness.
    pub subscription_id: u64,
    /// Budget forwarded to the coordinator for the fulfillment callback.
    pub callback_gas_limit: u32,
    /// Identity of the coordinator; the only caller allowed to fulfill.
    pub coordinator: Pubkey,
}

/// The single live round.
///
/// Owned by [`Raffle`](crate::Raffle) and mutated only through its operations.
/// `Clone` exists so settlement can snapshot the record and restore it if the
/// payout fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub state: RaffleState,
    pub ledger: EntryLedger,
    pub last_timestamp: UnixTimestamp,
    pub tracker: RandomnessRequestTracker,
    pub last_winner: Option<Pubkey>,
}

impl Round {
    /// A fresh open round starting at `now`.
    pub fn new(now: UnixTimestamp) -> Self {
        Self {
            state: RaffleState::Open,
            ledger: EntryLedger::default(),
            last_timestamp: now,
            tracker: RandomnessRequestTracker::default(),
            last_winner: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == RaffleState::Open
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.tracker.pending()
    }
}
