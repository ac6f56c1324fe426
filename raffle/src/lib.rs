//! Interval raffle driven by an automation keeper and a VRF coordinator.
//!
//! Players pay a fixed entrance fee into a shared pool. Once the configured
//! interval has elapsed and at least one player has entered, a keeper calls
//! [`Raffle::perform_upkeep`], which closes the round and asks the
//! coordinator for randomness. The coordinator answers later through
//! [`Raffle::fulfill`]; the first random word picks the winner, the whole
//! pool is paid out and a new round opens.
//!
//! ## Round lifecycle
//!
//! 1. **Open**: [`Raffle::enter`] appends players and grows the pool.
//! 2. **Upkeep**: [`Raffle::check_upkeep`] turns true when the round is open,
//!    funded, has players and the interval has elapsed.
//! 3. **Calculating**: [`Raffle::perform_upkeep`] records the pending request
//!    id; entries and further triggers are rejected.
//! 4. **Settlement**: [`Raffle::fulfill`] resets the round, then pays the
//!    winner. A failed payout restores the round untouched.

pub mod collaborators;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod machine;
pub mod settlement;
pub mod state;
pub mod tracker;
pub mod upkeep;

pub use collaborators::{
    Clock, OracleError, RandomWordsRequest, RandomnessOracle, SystemClock, TransferError,
    ValueTransfer,
};
pub use errors::RaffleError;
pub use events::{ChannelSink, EventSink, RaffleEvent};
pub use machine::Raffle;
pub use settlement::Settlement;
pub use state::{
    RaffleConfig, RaffleState, RequestId, Round, UnixTimestamp, NUM_WORDS, REQUEST_CONFIRMATIONS,
};
pub use upkeep::UpkeepCheck;
