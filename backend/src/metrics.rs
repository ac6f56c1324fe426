//! Prometheus-style metrics for the raffle backend.
//!
//! All counters are backed by atomics for lock-free concurrent access.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregated metrics for the raffle backend.
///
/// Thread-safe via atomics; cloneable via `Arc<Metrics>`.
pub struct Metrics {
    /// Total number of accepted entries.
    pub entries_accepted: AtomicU64,
    /// Total number of draws started by the keeper.
    pub draws_requested: AtomicU64,
    /// Total number of settled rounds.
    pub winners_picked: AtomicU64,
    /// Sum of all prizes paid, in lamports.
    pub prizes_paid: AtomicU64,
    /// Fulfillments that failed after exhausting retries.
    pub fulfillments_failed: AtomicU64,
    /// Fulfillments dropped because the raffle no longer wanted them.
    pub fulfillments_skipped: AtomicU64,
    /// Keeper polls that ended in an unexpected error.
    pub keeper_errors: AtomicU64,
    /// Sum of fulfillment latencies in milliseconds (for computing average).
    pub fulfillment_latency_sum_ms: AtomicU64,
    /// Number of fulfilled requests contributing to latency sum.
    pub fulfillment_count: AtomicU64,
}

impl Metrics {
    /// Create a new zeroed metrics instance.
    pub fn new() -> Self {
        Self {
            entries_accepted: AtomicU64::new(0),
            draws_requested: AtomicU64::new(0),
            winners_picked: AtomicU64::new(0),
            prizes_paid: AtomicU64::new(0),
            fulfillments_failed: AtomicU64::new(0),
            fulfillments_skipped: AtomicU64::new(0),
            keeper_errors: AtomicU64::new(0),
            fulfillment_latency_sum_ms: AtomicU64::new(0),
            fulfillment_count: AtomicU64::new(0),
        }
    }

    pub fn record_entry(&self) {
        self.entries_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_draw(&self) {
        self.draws_requested.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a settled round and its prize.
    pub fn record_winner(&self, prize: u64) {
        self.winners_picked.fetch_add(1, Ordering::Relaxed);
        self.prizes_paid.fetch_add(prize, Ordering::Relaxed);
    }

    /// Record a successful fulfillment with its latency.
    pub fn record_fulfillment(&self, latency_ms: u64) {
        self.fulfillment_latency_sum_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.fulfillment_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed fulfillment.
    pub fn record_failure(&self) {
        self.fulfillments_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.fulfillments_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_keeper_error(&self) {
        self.keeper_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Compute average fulfillment latency in milliseconds, or 0 if none.
    pub fn avg_latency_ms(&self) -> u64 {
        let count = self.fulfillment_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }
        self.fulfillment_latency_sum_ms.load(Ordering::Relaxed) / count
    }

    /// Serialize metrics as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "entries_accepted": self.entries_accepted.load(Ordering::Relaxed),
            "draws_requested": self.draws_requested.load(Ordering::Relaxed),
            "winners_picked": self.winners_picked.load(Ordering::Relaxed),
            "prizes_paid_lamports": self.prizes_paid.load(Ordering::Relaxed),
            "fulfillments_failed": self.fulfillments_failed.load(Ordering::Relaxed),
            "fulfillments_skipped": self.fulfillments_skipped.load(Ordering::Relaxed),
            "keeper_errors": self.keeper_errors.load(Ordering::Relaxed),
            "avg_fulfillment_latency_ms": self.avg_latency_ms(),
            "fulfillment_count": self.fulfillment_count.load(Ordering::Relaxed),
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
