use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;

use crate::state::RequestId;

/// Observations emitted by the raffle, in the order they happen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    /// A player's stake was accepted into the current round.
    EntryAccepted { player: Pubkey },
    /// The round moved to `Calculating` and randomness was requested.
    DrawRequested { request_id: RequestId },
    /// The pool was paid to `winner` and a new round opened.
    WinnerPicked { winner: Pubkey, prize: u64 },
}

impl RaffleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RaffleEvent::EntryAccepted { .. } => "EntryAccepted",
            RaffleEvent::DrawRequested { .. } => "DrawRequested",
            RaffleEvent::WinnerPicked { .. } => "WinnerPicked",
        }
    }
}

/// Receiver of raffle observations.
///
/// Sinks are notified after the operation has committed. A sink must not
/// fail the operation, so delivery errors are the sink's own business.
pub trait EventSink: Send {
    fn notify(&self, event: &RaffleEvent);
}

/// Forwards observations into an unbounded tokio channel.
#[derive(Clone, Debug)]
pub struct ChannelSink(pub mpsc::UnboundedSender<RaffleEvent>);

impl EventSink for ChannelSink {
    fn notify(&self, event: &RaffleEvent) {
        // A closed receiver only means nobody is listening anymore.
        let _ = self.0.send(event.clone());
    }
}

impl<F> EventSink for F
where
    F: Fn(&RaffleEvent) + Send,
{
    fn notify(&self, event: &RaffleEvent) {
        self(event)
    }
}

/// Fan-out list of registered sinks.
#[derive(Default)]
pub struct Observers {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Observers {
    pub fn subscribe(&mut self, sink: impl EventSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn emit(&self, event: RaffleEvent) {
        for sink in &self.sinks {
            sink.notify(&event);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
