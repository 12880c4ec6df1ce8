//! Write generations and identity epochs.
//!
//! Echo suppression compares counters instead of a boolean in-flight flag:
//! every local mutation ticks the generation, every identity change ticks
//! the epoch, and a remote write is identified by the pair it was started
//! with. A completion or snapshot carrying an older epoch belongs to a
//! previous identity and is ignored.

use crate::{Epoch, Generation};
use serde::{Deserialize, Serialize};

/// A monotonically increasing counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Counter(u64);

impl Counter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self(0)
    }

    /// Current value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Increment the counter and return the new value.
    pub fn tick(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

/// Identifies one remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteTicket {
    /// Identity session the write was started in
    pub epoch: Epoch,
    /// Local generation the written items reflect
    pub generation: Generation,
}

impl WriteTicket {
    /// Create a ticket.
    pub fn new(epoch: Epoch, generation: Generation) -> Self {
        Self { epoch, generation }
    }

    /// Whether this write was started under a different identity session.
    pub fn is_stale(&self, current_epoch: Epoch) -> bool {
        self.epoch != current_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_zero() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn tick_increments() {
        let mut counter = Counter::new();
        assert_eq!(counter.tick(), 1);
        assert_eq!(counter.tick(), 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn ticket_staleness() {
        let ticket = WriteTicket::new(3, 10);
        assert!(!ticket.is_stale(3));
        assert!(ticket.is_stale(4));
    }

    #[test]
    fn serialization_format() {
        let ticket = WriteTicket::new(1, 2);
        let json = serde_json::to_string(&ticket).unwrap();
        assert_eq!(json, r#"{"epoch":1,"generation":2}"#);
    }
}
