use solana_sdk::pubkey::Pubkey;
use tracing::{info, instrument, warn};

use crate::collaborators::{Clock, RandomWordsRequest, RandomnessOracle, SystemClock, ValueTransfer};
use crate::errors::RaffleError;
use crate::events::{EventSink, Observers, RaffleEvent};
use crate::settlement::{self, Settlement};
use crate::state::{
    RaffleConfig, RaffleState, RequestId, Round, UnixTimestamp, NUM_WORDS, REQUEST_CONFIRMATIONS,
};
use crate::upkeep::{self, UpkeepCheck};

/// The raffle: one live round plus the collaborators that drive it.
///
/// Every operation validates first, then mutates the round, and only then
/// talks to a collaborator. An operation that returns `Err` leaves the round
/// as it found it.
pub struct Raffle<O, T, C = SystemClock> {
    config: RaffleConfig,
    round: Round,
    oracle: O,
    transfer: T,
    clock: C,
    observers: Observers,
}

impl<O, T> Raffle<O, T, SystemClock>
where
    O: RandomnessOracle,
    T: ValueTransfer,
{
    pub fn new(config: RaffleConfig, oracle: O, transfer: T) -> Self {
        Self::with_clock(config, oracle, transfer, SystemClock)
    }
}

impl<O, T, C> Raffle<O, T, C>
where
    O: RandomnessOracle,
    T: ValueTransfer,
    C: Clock,
{
    /// Open the first round at the clock's current time.
    pub fn with_clock(config: RaffleConfig, oracle: O, transfer: T, clock: C) -> Self {
        let round = Round::new(clock.unix_timestamp());
        info!(
            entrance_fee = config.entrance_fee,
            interval = config.interval,
            subscription_id = config.subscription_id,
            coordinator = %config.coordinator,
            "Raffle opened"
        );
        Self {
            config,
            round,
            oracle,
            transfer,
            clock,
            observers: Observers::default(),
        }
    }

    /// Register an observer for [`RaffleEvent`]s.
    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.observers.subscribe(sink);
    }

    /// Enter the current round with a stake of `amount` lamports.
    pub fn enter(&mut self, player: Pubkey, amount: u64) -> Result<(), RaffleError> {
        self.round
            .ledger
            .enter(self.round.state, self.config.entrance_fee, player, amount)?;

        info!(
            player = %player,
            amount,
            players = self.round.ledger.num_players(),
            "Entry accepted"
        );
        self.observers.emit(RaffleEvent::EntryAccepted { player });
        Ok(())
    }

    /// Whether a draw may be started now.
    pub fn check_upkeep(&self) -> bool {
        upkeep::check_upkeep(&self.round, &self.config, self.clock.unix_timestamp())
    }

    /// The individual conditions behind [`check_upkeep`](Self::check_upkeep).
    pub fn upkeep_check(&self) -> UpkeepCheck {
        UpkeepCheck::evaluate(&self.round, &self.config, self.clock.unix_timestamp())
    }

    /// Close the round to entries and request randomness for the draw.
    ///
    /// Eligibility is re-checked here; a stale or racing keeper gets
    /// `UpkeepNotNeeded` carrying the values observed at this call.
    #[instrument(skip_all)]
    pub fn perform_upkeep(&mut self) -> Result<RequestId, RaffleError> {
        if !self.check_upkeep() {
            return Err(RaffleError::UpkeepNotNeeded {
                balance: self.round.ledger.balance(),
                players: self.round.ledger.num_players(),
                state: self.round.state,
            });
        }

        self.round.state = RaffleState::Calculating;

        let request = RandomWordsRequest {
            gas_lane: self.config.gas_lane,
            subscription_id: self.config.subscription_id,
            request_confirmations: REQUEST_CONFIRMATIONS,
            callback_gas_limit: self.config.callback_gas_limit,
            num_words: NUM_WORDS,
        };
        let request_id = match self.oracle.request_random_words(request) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Randomness request refused, reopening round");
                self.round.state = RaffleState::Open;
                return Err(e.into());
            }
        };
        self.round.tracker.track(request_id);

        info!(
            request_id,
            players = self.round.ledger.num_players(),
            balance = self.round.ledger.balance(),
            "Requested raffle winner"
        );
        self.observers.emit(RaffleEvent::DrawRequested { request_id });
        Ok(request_id)
    }

    /// Deliver randomness for the pending request and pay the winner.
    ///
    /// Only the configured coordinator may call this.
    #[instrument(skip(self, caller, random_words))]
    pub fn fulfill(
        &mut self,
        caller: &Pubkey,
        request_id: RequestId,
        random_words: &[u64],
    ) -> Result<Settlement, RaffleError> {
        if *caller != self.config.coordinator {
            return Err(RaffleError::OnlyCoordinatorCanFulfill {
                have: *caller,
                want: self.config.coordinator,
            });
        }

        let now = self.clock.unix_timestamp();
        let staged = settlement::stage(&mut self.round, request_id, random_words, now)?;
        let settlement = staged.execute(&mut self.round, &mut self.transfer)?;

        info!(
            request_id,
            winner = %settlement.winner,
            index = settlement.winner_index,
            prize = settlement.prize,
            "Winner picked"
        );
        self.observers.emit(RaffleEvent::WinnerPicked {
            winner: settlement.winner,
            prize: settlement.prize,
        });
        Ok(settlement)
    }
}

impl<O, T, C> Raffle<O, T, C> {
    pub fn config(&self) -> &RaffleConfig {
        &self.config
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn raffle_state(&self) -> RaffleState {
        self.round.state
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.round.ledger.player(index)
    }

    pub fn num_players(&self) -> usize {
        self.round.ledger.num_players()
    }

    pub fn balance(&self) -> u64 {
        self.round.ledger.balance()
    }

    pub fn interval(&self) -> i64 {
        self.config.interval
    }

    pub fn last_timestamp(&self) -> UnixTimestamp {
        self.round.last_timestamp
    }

    pub fn last_winner(&self) -> Option<Pubkey> {
        self.round.last_winner
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.round.pending_request()
    }

    pub fn coordinator(&self) -> &Pubkey {
        &self.config.coordinator
    }

    pub fn subscription_id(&self) -> u64 {
        self.config.subscription_id
    }

    pub fn gas_lane(&self) -> &[u8; 32] {
        &self.config.gas_lane
    }

    pub fn callback_gas_limit(&self) -> u32 {
        self.config.callback_gas_limit
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }

    pub fn request_confirmations(&self) -> u16 {
        REQUEST_CONFIRMATIONS
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    pub fn transfer_mut(&mut self) -> &mut T {
        &mut self.transfer
    }
}

impl<O, T, C> std::fmt::Debug for Raffle<O, T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raffle")
            .field("config", &self.config)
            .field("round", &self.round)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{OracleError, TransferError};
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    const FEE: u64 = 10_000_000;
    const INTERVAL: i64 = 30;
    const START: UnixTimestamp = 1_700_000_000;

    #[derive(Default)]
    struct Coordinator {
        next_id: RequestId,
        requests: Vec<RandomWordsRequest>,
        refuse: bool,
    }

    impl RandomnessOracle for Coordinator {
        fn request_random_words(
            &mut self,
            request: RandomWordsRequest,
        ) -> Result<RequestId, OracleError> {
            if self.refuse {
                return Err(OracleError::InvalidSubscription(request.subscription_id));
            }
            self.next_id += 1;
            self.requests.push(request);
            Ok(self.next_id)
        }
    }

    #[derive(Default)]
    struct Wallets {
        balances: HashMap<Pubkey, u64>,
        refuse: bool,
    }

    impl ValueTransfer for Wallets {
        fn transfer(&mut self, to: &Pubkey, amount: u64) -> Result<(), TransferError> {
            if self.refuse {
                return Err(TransferError::Rejected(*to));
            }
            *self.balances.entry(*to).or_default() += amount;
            Ok(())
        }
    }

    type TestRaffle = Raffle<Coordinator, Wallets, Box<dyn Fn() -> UnixTimestamp>>;

    struct Harness {
        raffle: TestRaffle,
        now: Rc<Cell<UnixTimestamp>>,
        coordinator: Pubkey,
        events: Arc<Mutex<Vec<RaffleEvent>>>,
    }

    impl Harness {
        fn new() -> Self {
            let now = Rc::new(Cell::new(START));
            let clock_now = now.clone();
            let clock: Box<dyn Fn() -> UnixTimestamp> = Box::new(move || clock_now.get());
            let coordinator = Pubkey::new_unique();
            let config = RaffleConfig {
                entrance_fee: FEE,
                interval: INTERVAL,
                gas_lane: [9u8; 32],
                subscription_id: 11388,
                callback_gas_limit: 500_000,
                coordinator,
            };
            let mut raffle =
                Raffle::with_clock(config, Coordinator::default(), Wallets::default(), clock);
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = events.clone();
            raffle.subscribe(move |event: &RaffleEvent| sink.lock().unwrap().push(event.clone()));
            Self {
                raffle,
                now,
                coordinator,
                events,
            }
        }

        fn advance(&self, secs: i64) {
            self.now.set(self.now.get() + secs);
        }

        fn ready_to_draw(&mut self, players: &[Pubkey]) {
            for player in players {
                self.raffle.enter(*player, FEE).unwrap();
            }
            self.advance(INTERVAL + 1);
        }
    }

    #[test]
    fn constructor_exposes_configuration() {
        let h = Harness::new();
        assert_eq!(h.raffle.raffle_state(), RaffleState::Open);
        assert_eq!(h.raffle.entrance_fee(), FEE);
        assert_eq!(h.raffle.interval(), INTERVAL);
        assert_eq!(h.raffle.coordinator(), &h.coordinator);
        assert_eq!(h.raffle.subscription_id(), 11388);
        assert_eq!(h.raffle.num_words(), 1);
        assert_eq!(h.raffle.request_confirmations(), 3);
        assert_eq!(h.raffle.last_timestamp(), START);
        assert_eq!(h.raffle.last_winner(), None);
    }

    #[test]
    fn enter_records_player_and_emits() {
        let mut h = Harness::new();
        let player = Pubkey::new_unique();
        h.raffle.enter(player, FEE).unwrap();

        assert_eq!(h.raffle.player(0), Some(&player));
        assert_eq!(h.raffle.balance(), FEE);
        assert_eq!(
            *h.events.lock().unwrap(),
            vec![RaffleEvent::EntryAccepted { player }]
        );
    }

    #[test]
    fn enter_rejected_while_calculating() {
        let mut h = Harness::new();
        h.ready_to_draw(&[Pubkey::new_unique()]);
        h.raffle.perform_upkeep().unwrap();

        let err = h.raffle.enter(Pubkey::new_unique(), FEE).unwrap_err();
        assert_eq!(err, RaffleError::RaffleNotOpen);
        assert_eq!(h.raffle.num_players(), 1);
    }

    #[test]
    fn perform_upkeep_forwards_request_parameters() {
        let mut h = Harness::new();
        h.ready_to_draw(&[Pubkey::new_unique()]);

        let request_id = h.raffle.perform_upkeep().unwrap();

        assert_eq!(request_id, 1);
        assert_eq!(h.raffle.raffle_state(), RaffleState::Calculating);
        assert_eq!(h.raffle.pending_request(), Some(1));
        assert_eq!(
            h.raffle.oracle().requests,
            vec![RandomWordsRequest {
                gas_lane: [9u8; 32],
                subscription_id: 11388,
                request_confirmations: 3,
                callback_gas_limit: 500_000,
                num_words: 1,
            }]
        );
        assert_eq!(
            h.events.lock().unwrap().last(),
            Some(&RaffleEvent::DrawRequested { request_id: 1 })
        );
    }

    #[test]
    fn perform_upkeep_reports_observed_values() {
        let mut h = Harness::new();
        h.raffle.enter(Pubkey::new_unique(), FEE).unwrap();

        let err = h.raffle.perform_upkeep().unwrap_err();
        assert_eq!(
            err,
            RaffleError::UpkeepNotNeeded {
                balance: FEE,
                players: 1,
                state: RaffleState::Open,
            }
        );
        assert_eq!(h.raffle.raffle_state(), RaffleState::Open);
        assert!(h.raffle.oracle().requests.is_empty());
    }

    #[test]
    fn second_trigger_is_turned_away() {
        let mut h = Harness::new();
        h.ready_to_draw(&[Pubkey::new_unique()]);
        h.raffle.perform_upkeep().unwrap();

        let err = h.raffle.perform_upkeep().unwrap_err();
        assert!(matches!(
            err,
            RaffleError::UpkeepNotNeeded {
                state: RaffleState::Calculating,
                ..
            }
        ));
        assert_eq!(h.raffle.pending_request(), Some(1));
        assert_eq!(h.raffle.oracle().requests.len(), 1);
    }

    #[test]
    fn perform_upkeep_follows_check_upkeep_at_the_boundary() {
        let mut h = Harness::new();
        h.raffle.enter(Pubkey::new_unique(), FEE).unwrap();

        h.advance(INTERVAL - 1);
        assert!(!h.raffle.check_upkeep());
        assert!(matches!(
            h.raffle.perform_upkeep(),
            Err(RaffleError::UpkeepNotNeeded { players: 1, .. })
        ));

        h.advance(1);
        assert!(h.raffle.check_upkeep());
        assert_eq!(h.raffle.perform_upkeep(), Ok(1));
    }

    #[test]
    fn refused_request_reopens_round() {
        let mut h = Harness::new();
        h.ready_to_draw(&[Pubkey::new_unique()]);
        h.raffle.oracle.refuse = true;

        let err = h.raffle.perform_upkeep().unwrap_err();
        assert_eq!(
            err,
            RaffleError::RandomnessRequestFailed(OracleError::InvalidSubscription(11388))
        );
        assert_eq!(h.raffle.raffle_state(), RaffleState::Open);
        assert_eq!(h.raffle.pending_request(), None);
        assert!(h.raffle.check_upkeep());
    }

    #[test]
    fn fulfill_only_from_coordinator() {
        let mut h = Harness::new();
        h.ready_to_draw(&[Pubkey::new_unique()]);
        h.raffle.perform_upkeep().unwrap();

        let stranger = Pubkey::new_unique();
        let err = h.raffle.fulfill(&stranger, 1, &[0]).unwrap_err();
        assert_eq!(
            err,
            RaffleError::OnlyCoordinatorCanFulfill {
                have: stranger,
                want: h.coordinator,
            }
        );
        assert_eq!(h.raffle.raffle_state(), RaffleState::Calculating);
    }

    #[test]
    fn fulfill_before_any_trigger_is_nonexistent() {
        let mut h = Harness::new();
        h.ready_to_draw(&[Pubkey::new_unique()]);
        let coordinator = h.coordinator;

        for id in [0, 1] {
            assert_eq!(
                h.raffle.fulfill(&coordinator, id, &[3]).unwrap_err(),
                RaffleError::NonexistentRequest(id)
            );
        }
    }

    #[test]
    fn settlement_pays_pool_and_resets() {
        let mut h = Harness::new();
        let players = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        h.ready_to_draw(&players);
        let request_id = h.raffle.perform_upkeep().unwrap();
        h.advance(5);
        let settled_at = h.now.get();
        let coordinator = h.coordinator;

        let settlement = h.raffle.fulfill(&coordinator, request_id, &[7]).unwrap();

        assert_eq!(settlement.winner, players[1]);
        assert_eq!(settlement.prize, 3 * FEE);
        assert_eq!(h.raffle.transfer().balances[&players[1]], 3 * FEE);
        assert_eq!(h.raffle.raffle_state(), RaffleState::Open);
        assert_eq!(h.raffle.num_players(), 0);
        assert_eq!(h.raffle.balance(), 0);
        assert_eq!(h.raffle.pending_request(), None);
        assert_eq!(h.raffle.last_winner(), Some(players[1]));
        assert_eq!(h.raffle.last_timestamp(), settled_at);
        assert_eq!(
            h.events.lock().unwrap().last(),
            Some(&RaffleEvent::WinnerPicked {
                winner: players[1],
                prize: 3 * FEE
            })
        );

        assert_eq!(
            h.raffle.fulfill(&coordinator, request_id, &[7]).unwrap_err(),
            RaffleError::NonexistentRequest(request_id)
        );
    }

    #[test]
    fn failed_payout_keeps_round_calculating() {
        let mut h = Harness::new();
        let players = [Pubkey::new_unique(), Pubkey::new_unique()];
        h.ready_to_draw(&players);
        let request_id = h.raffle.perform_upkeep().unwrap();
        let before = h.raffle.round().clone();
        let events_before = h.events.lock().unwrap().len();
        h.raffle.transfer_mut().refuse = true;
        let coordinator = h.coordinator;

        let err = h.raffle.fulfill(&coordinator, request_id, &[1]).unwrap_err();

        assert_eq!(err, RaffleError::TransferFailed(TransferError::Rejected(players[1])));
        assert_eq!(h.raffle.round(), &before);
        assert_eq!(h.events.lock().unwrap().len(), events_before);

        h.raffle.transfer_mut().refuse = false;
        let settlement = h.raffle.fulfill(&coordinator, request_id, &[1]).unwrap();
        assert_eq!(settlement.winner, players[1]);
    }
}
