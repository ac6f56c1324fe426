//! Winner selection and payout.
//!
//! Settlement runs in two explicit stages. [`stage`] validates the
//! fulfillment, picks the winner and resets the round in place, keeping a
//! snapshot of what it replaced. [`StagedPayout::execute`] then performs the
//! only external effect, the transfer. If the transfer fails the snapshot is
//! written back, so a failed settlement is indistinguishable from one that
//! never started. While the transfer runs, the round already reads as a fresh
//! open round with an empty pool.

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::collaborators::ValueTransfer;
use crate::errors::RaffleError;
use crate::state::{RaffleState, RequestId, Round, UnixTimestamp};

/// Map a random word onto a player index.
///
/// Returns `None` for an empty round.
pub fn winner_index(random_word: u64, num_players: usize) -> Option<usize> {
    let num_players = u64::try_from(num_players).ok()?;
    random_word
        .checked_rem(num_players)
        .and_then(|index| usize::try_from(index).ok())
}

/// Outcome of a completed settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub request_id: RequestId,
    pub winner_index: usize,
    pub winner: Pubkey,
    pub prize: u64,
}

/// A round that has been reset but whose winner has not been paid yet.
#[derive(Debug)]
#[must_use = "a staged payout must be executed or rolled back"]
pub struct StagedPayout {
    settlement: Settlement,
    snapshot: Round,
}

impl StagedPayout {
    pub fn winner(&self) -> Pubkey {
        self.settlement.winner
    }

    pub fn prize(&self) -> u64 {
        self.settlement.prize
    }

    /// Pay the winner. On failure the round is restored from the snapshot.
    pub fn execute<T>(self, round: &mut Round, transfer: &mut T) -> Result<Settlement, RaffleError>
    where
        T: ValueTransfer + ?Sized,
    {
        let Settlement { winner, prize, .. } = self.settlement;
        match transfer.transfer(&winner, prize) {
            Ok(()) => {
                round.last_winner = Some(winner);
                Ok(self.settlement)
            }
            Err(e) => {
                warn!(winner = %winner, prize, error = %e, "Payout failed, restoring round");
                self.rollback(round);
                Err(RaffleError::TransferFailed(e))
            }
        }
    }

    /// Put the round back exactly as it was before [`stage`].
    pub fn rollback(self, round: &mut Round) {
        *round = self.snapshot;
    }
}

/// Validate a fulfillment and reset the round ahead of the payout.
///
/// Nothing is mutated unless every check passes.
pub fn stage(
    round: &mut Round,
    request_id: RequestId,
    random_words: &[u64],
    now: UnixTimestamp,
) -> Result<StagedPayout, RaffleError> {
    round.tracker.verify(request_id)?;
    let random_word = *random_words.first().ok_or(RaffleError::MissingRandomWords)?;
    let index =
        winner_index(random_word, round.ledger.num_players()).ok_or(RaffleError::EmptyRound)?;
    let winner = *round.ledger.player(index).ok_or(RaffleError::EmptyRound)?;

    let snapshot = round.clone();

    round.tracker.consume(request_id)?;
    let prize = round.ledger.drain();
    round.last_timestamp = now;
    round.state = RaffleState::Open;

    debug!(request_id, index, winner = %winner, prize, "Round reset ahead of payout");

    Ok(StagedPayout {
        settlement: Settlement {
            request_id,
            winner_index: index,
            winner,
            prize,
        },
        snapshot,
    })
}
