use solana_sdk::pubkey::Pubkey;

use crate::errors::RaffleError;
use crate::state::RaffleState;

/// Entrants and pooled stake of the current round.
///
/// Players are kept in the order they entered; the same key may appear more
/// than once. Nothing is ever removed except by [`EntryLedger::drain`], which
/// settlement calls when the pool is paid out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryLedger {
    players: Vec<Pubkey>,
    balance: u64,
}

impl EntryLedger {
    /// Admit `player` with a stake of `amount`.
    ///
    /// The fee is checked before the round state.
    pub fn enter(
        &mut self,
        state: RaffleState,
        entrance_fee: u64,
        player: Pubkey,
        amount: u64,
    ) -> Result<(), RaffleError> {
        if amount < entrance_fee {
            return Err(RaffleError::InsufficientPayment {
                sent: amount,
                required: entrance_fee,
            });
        }
        if state != RaffleState::Open {
            return Err(RaffleError::RaffleNotOpen);
        }

        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(RaffleError::BalanceOverflow)?;

        self.players.push(player);
        self.balance = balance;
        Ok(())
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.players.get(index)
    }

    pub fn players(&self) -> &[Pubkey] {
        &self.players
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Empty the ledger, returning the pool that was held.
    pub(crate) fn drain(&mut self) -> u64 {
        self.players.clear();
        std::mem::take(&mut self.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE: u64 = 10_000_000;

    #[test]
    fn records_players_in_order_with_duplicates() {
        let mut ledger = EntryLedger::default();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();

        for player in [a, b, a] {
            ledger.enter(RaffleState::Open, FEE, player, FEE).unwrap();
        }

        assert_eq!(ledger.players(), &[a, b, a]);
        assert_eq!(ledger.balance(), 3 * FEE);
    }

    #[test]
    fn rejects_underpayment_without_touching_the_pool() {
        let mut ledger = EntryLedger::default();
        let err = ledger
            .enter(RaffleState::Open, FEE, Pubkey::new_unique(), FEE - 1)
            .unwrap_err();

        assert_eq!(
            err,
            RaffleError::InsufficientPayment {
                sent: FEE - 1,
                required: FEE
            }
        );
        assert!(ledger.is_empty());
        assert_eq!(ledger.balance(), 0);
    }

    #[test]
    fn rejects_entries_while_calculating() {
        let mut ledger = EntryLedger::default();
        let err = ledger
            .enter(RaffleState::Calculating, FEE, Pubkey::new_unique(), FEE)
            .unwrap_err();
        assert_eq!(err, RaffleError::RaffleNotOpen);
        assert!(ledger.is_empty());
    }

    #[test]
    fn overpayment_goes_into_the_pool() {
        let mut ledger = EntryLedger::default();
        ledger
            .enter(RaffleState::Open, FEE, Pubkey::new_unique(), FEE * 2)
            .unwrap();
        assert_eq!(ledger.balance(), FEE * 2);
    }

    #[test]
    fn overflow_leaves_ledger_untouched() {
        let mut ledger = EntryLedger::default();
        let a = Pubkey::new_unique();
        ledger.enter(RaffleState::Open, 1, a, u64::MAX).unwrap();

        let err = ledger
            .enter(RaffleState::Open, 1, Pubkey::new_unique(), 1)
            .unwrap_err();

        assert_eq!(err, RaffleError::BalanceOverflow);
        assert_eq!(ledger.players(), &[a]);
        assert_eq!(ledger.balance(), u64::MAX);
    }

    #[test]
    fn drain_returns_pool_and_clears() {
        let mut ledger = EntryLedger::default();
        ledger
            .enter(RaffleState::Open, FEE, Pubkey::new_unique(), FEE)
            .unwrap();

        assert_eq!(ledger.drain(), FEE);
        assert!(ledger.is_empty());
        assert_eq!(ledger.balance(), 0);
    }
}
