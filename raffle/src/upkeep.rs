use crate::state::{RaffleConfig, RaffleState, Round, UnixTimestamp};

/// The four conditions behind the upkeep predicate, evaluated at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpkeepCheck {
    pub is_open: bool,
    pub time_passed: bool,
    pub has_players: bool,
    pub has_balance: bool,
}

impl UpkeepCheck {
    /// Evaluate the round against the configured interval at `now`.
    ///
    /// Pure: reads the round, never mutates it. A clock that went backwards
    /// simply reports the interval as not elapsed.
    pub fn evaluate(round: &Round, config: &RaffleConfig, now: UnixTimestamp) -> Self {
        let elapsed = now.saturating_sub(round.last_timestamp);
        Self {
            is_open: round.state == RaffleState::Open,
            time_passed: elapsed >= config.interval,
            has_players: !round.ledger.is_empty(),
            has_balance: round.ledger.balance() > 0,
        }
    }

    /// True iff a draw may start now.
    pub fn needed(&self) -> bool {
        self.is_open && self.time_passed && self.has_players && self.has_balance
    }
}

/// Eligibility predicate behind `Raffle::check_upkeep` and `Raffle::perform_upkeep`.
pub fn check_upkeep(round: &Round, config: &RaffleConfig, now: UnixTimestamp) -> bool {
    UpkeepCheck::evaluate(round, config, now).needed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    const START: UnixTimestamp = 1_000;
    const INTERVAL: i64 = 30;
    const FEE: u64 = 10_000_000;

    fn config() -> RaffleConfig {
        RaffleConfig {
            entrance_fee: FEE,
            interval: INTERVAL,
            gas_lane: [7u8; 32],
            subscription_id: 1,
            callback_gas_limit: 500_000,
            coordinator: Pubkey::new_unique(),
        }
    }

    fn funded_round() -> Round {
        let mut round = Round::new(START);
        round
            .ledger
            .enter(RaffleState::Open, FEE, Pubkey::new_unique(), FEE)
            .unwrap();
        round
    }

    #[test]
    fn false_without_players_or_balance() {
        let round = Round::new(START);
        let check = UpkeepCheck::evaluate(&round, &config(), START + INTERVAL + 1);
        assert!(!check.has_players);
        assert!(!check.has_balance);
        assert!(!check.needed());
    }

    #[test]
    fn false_before_interval_elapses() {
        let round = funded_round();
        assert!(!check_upkeep(&round, &config(), START + INTERVAL - 1));
    }

    #[test]
    fn true_exactly_at_interval() {
        let round = funded_round();
        assert!(check_upkeep(&round, &config(), START + INTERVAL));
    }

    #[test]
    fn false_while_calculating() {
        let mut round = funded_round();
        round.state = RaffleState::Calculating;
        let check = UpkeepCheck::evaluate(&round, &config(), START + INTERVAL + 10);
        assert!(!check.is_open);
        assert!(!check.needed());
    }

    #[test]
    fn clock_going_backwards_is_not_elapsed() {
        let round = funded_round();
        assert!(!check_upkeep(&round, &config(), START - 100));
    }
}
