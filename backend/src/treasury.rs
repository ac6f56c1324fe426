//! Payout ledger: the raffle's payment rail.
//!
//! Credits each winner's account with the prize. Balances are kept in
//! memory and exposed over HTTP.

use std::collections::HashMap;

use raffle::{TransferError, ValueTransfer};
use solana_sdk::pubkey::Pubkey;
use tracing::info;

#[derive(Debug, Default)]
pub struct PayoutLedger {
    credited: HashMap<Pubkey, u64>,
    total_paid: u64,
    payouts: u64,
}

impl PayoutLedger {
    /// Lamports credited to `player` across all settled rounds.
    pub fn balance_of(&self, player: &Pubkey) -> u64 {
        self.credited.get(player).copied().unwrap_or_default()
    }

    pub fn total_paid(&self) -> u64 {
        self.total_paid
    }

    pub fn payouts(&self) -> u64 {
        self.payouts
    }
}

impl ValueTransfer for PayoutLedger {
    fn transfer(&mut self, to: &Pubkey, amount: u64) -> Result<(), TransferError> {
        let current = self.balance_of(to);
        let credited = current
            .checked_add(amount)
            .ok_or(TransferError::Overflow(*to))?;

        self.credited.insert(*to, credited);
        // Statistics only; never a reason to refuse a payout.
        self.total_paid = self.total_paid.saturating_add(amount);
        self.payouts = self.payouts.saturating_add(1);

        info!(recipient = %to, amount, credited, "Payout credited");
        Ok(())
    }
}
