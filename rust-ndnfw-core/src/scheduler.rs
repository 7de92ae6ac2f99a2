//! Timer queue for PIT expiry and pruning.
//!
//! Timers are never cancelled. Each one carries the generation of the PIT
//! entry it was scheduled for, and the engine ignores it if the entry has
//! moved on since.

use rust_ndnfw_common::ndn::Name;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

/// What a timer does when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// The PIT entry for `name` reached its expiry.
    PitEntry { name: Name, generation: u64 },
}

#[derive(Debug)]
struct Scheduled {
    deadline: Instant,
    seq: u64,
    event: TimerEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of pending timers. Timers with equal deadlines fire in the
/// order they were scheduled.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: Instant, event: TimerEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled {
            deadline,
            seq,
            event,
        }));
    }

    /// Deadline of the earliest timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(scheduled)| scheduled.deadline)
    }

    /// Removes and returns the earliest timer if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerEvent> {
        match self.heap.peek() {
            Some(Reverse(scheduled)) if scheduled.deadline <= now => {
                self.heap.pop().map(|Reverse(scheduled)| scheduled.event)
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
