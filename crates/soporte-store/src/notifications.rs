// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped log of inbound events. Not authoritative state.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use soporte_core::InboundEvent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Monotonic across the life of the log, including evicted entries.
    pub seq: u64,
    pub name: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Append-only ring of the most recent notifications.
#[derive(Debug, Clone)]
pub struct NotificationLog {
    capacity: usize,
    entries: VecDeque<Notification>,
    next_seq: u64,
}

impl NotificationLog {
    /// A log holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
            next_seq: 0,
        }
    }

    /// Records an event, evicting the oldest entry when full.
    pub fn record(&mut self, event: &InboundEvent) -> u64 {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(Notification {
            seq,
            name: event.name.clone(),
            payload: event.payload.clone(),
            received_at: Utc::now(),
        });
        seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total events ever recorded.
    pub fn total(&self) -> u64 {
        self.next_seq
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    /// The `n` most recent entries, newest last.
    pub fn recent(&self, n: usize) -> Vec<Notification> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evicts_oldest_when_full() {
        let mut log = NotificationLog::new(2);
        for name in ["a", "b", "c"] {
            log.record(&InboundEvent::new(name, json!({})));
        }
        let names: Vec<_> = log.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
        assert_eq!(log.total(), 3);
        assert_eq!(log.recent(1)[0].seq, 2);
    }

    #[test]
    fn zero_capacity_still_keeps_one() {
        let mut log = NotificationLog::new(0);
        log.record(&InboundEvent::new("x", json!(null)));
        assert_eq!(log.len(), 1);
    }
}
