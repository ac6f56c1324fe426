use crate::errors::RaffleError;
use crate::state::RequestId;

/// Remembers the one randomness request the round is waiting for.
///
/// A request id is accepted by [`consume`](Self::consume) at most once. Ids
/// that were never tracked, ids already consumed and any id while nothing is
/// pending are all reported as [`RaffleError::NonexistentRequest`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RandomnessRequestTracker {
    pending: Option<RequestId>,
}

impl RandomnessRequestTracker {
    pub fn pending(&self) -> Option<RequestId> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record the id returned by the coordinator.
    pub(crate) fn track(&mut self, request_id: RequestId) {
        debug_assert!(self.pending.is_none(), "a request is already pending");
        self.pending = Some(request_id);
    }

    /// Check that `request_id` is the pending one without consuming it.
    pub fn verify(&self, request_id: RequestId) -> Result<(), RaffleError> {
        match self.pending {
            Some(pending) if pending == request_id => Ok(()),
            _ => Err(RaffleError::NonexistentRequest(request_id)),
        }
    }

    /// Verify and clear.
    pub(crate) fn consume(&mut self, request_id: RequestId) -> Result<(), RaffleError> {
        self.verify(request_id)?;
        self.pending = None;
        Ok(())
    }
}
