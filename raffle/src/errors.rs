use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::collaborators::{OracleError, TransferError};
use crate::state::{RaffleState, RequestId};

/// Errors returned by the raffle operations.
///
/// Every variant aborts the whole call; the round is left exactly as it was
/// before the call started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// The stake sent with `enter` is below the entrance fee.
    #[error("Insufficient payment: sent {sent}, entrance fee is {required}")]
    InsufficientPayment { sent: u64, required: u64 },

    /// Entries are only accepted while the round is open.
    #[error("Raffle is not open")]
    RaffleNotOpen,

    /// `perform_upkeep` was called while the upkeep predicate is false.
    #[error("Upkeep not needed (balance={balance}, players={players}, state={state})")]
    UpkeepNotNeeded {
        balance: u64,
        players: usize,
        state: RaffleState,
    },

    /// The fulfilled request id is not the one the round is waiting for.
    #[error("Nonexistent request {0}")]
    NonexistentRequest(RequestId),

    /// Paying the winner failed; the settlement was rolled back.
    #[error("Transfer failed: {0}")]
    TransferFailed(TransferError),

    /// The fulfillment did not come from the configured coordinator.
    #[error("Only coordinator can fulfill (have {have}, want {want})")]
    OnlyCoordinatorCanFulfill { have: Pubkey, want: Pubkey },

    /// A fulfillment arrived without any random words.
    #[error("Fulfillment carried no random words")]
    MissingRandomWords,

    /// The coordinator refused the randomness request.
    #[error("Randomness request failed: {0}")]
    RandomnessRequestFailed(OracleError),

    /// Adding the stake would overflow the pool.
    #[error("Pool balance overflow")]
    BalanceOverflow,

    /// Settlement was attempted on a round without entrants.
    #[error("Round has no players")]
    EmptyRound,
}

impl From<TransferError> for RaffleError {
    fn from(e: TransferError) -> Self {
        RaffleError::TransferFailed(e)
    }
}

impl From<OracleError> for RaffleError {
    fn from(e: OracleError) -> Self {
        RaffleError::RandomnessRequestFailed(e)
    }
}

impl RaffleError {
    /// Whether repeating the same call later could succeed without any other
    /// actor changing the round first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RaffleError::TransferFailed(_) | RaffleError::RandomnessRequestFailed(_)
        )
    }
}
