//! Event types emitted by book mutations
//!
//! Every successful placement or cancellation produces exactly one event
//! carrying a global, gap-free sequence number. Events are:
//! - Deterministically ordered for replay
//! - Self-describing enough to rebuild the book from scratch
//! - Compact under bincode for the on-disk journal

use crate::core::Side;
use book_common::{AccountId, Amount, OrderId, Ts};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A mutation of the book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookEvent {
    /// Order inserted into a side
    Placed {
        /// Global sequence number
        sequence: u64,
        /// Side that received the order
        side: Side,
        /// Id assigned at placement
        order_id: OrderId,
        /// Placing account
        owner: AccountId,
        /// Deposited amount
        amount: Amount,
        /// Amount credited after the fee
        net_amount: Amount,
        /// Time of placement
        timestamp: Ts,
    },
    /// Order removed from a side
    Cancelled {
        /// Global sequence number
        sequence: u64,
        /// Side the order was removed from
        side: Side,
        /// Id of the removed order
        order_id: OrderId,
        /// Account that had placed it
        owner: AccountId,
        /// Net amount the order held
        net_amount: Amount,
        /// Time of cancellation
        timestamp: Ts,
    },
}

impl BookEvent {
    /// Sequence number of this event
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u64 {
        match self {
            BookEvent::Placed { sequence, .. } | BookEvent::Cancelled { sequence, .. } => *sequence,
        }
    }

    /// Side touched by this event
    #[inline]
    #[must_use]
    pub fn side(&self) -> Side {
        match self {
            BookEvent::Placed { side, .. } | BookEvent::Cancelled { side, .. } => *side,
        }
    }

    /// Order touched by this event
    #[inline]
    #[must_use]
    pub fn order_id(&self) -> OrderId {
        match self {
            BookEvent::Placed { order_id, .. } | BookEvent::Cancelled { order_id, .. } => *order_id,
        }
    }

    /// Event timestamp
    #[must_use]
    pub fn timestamp(&self) -> Ts {
        match self {
            BookEvent::Placed { timestamp, .. } | BookEvent::Cancelled { timestamp, .. } => *timestamp,
        }
    }

    /// True for placements
    #[must_use]
    pub fn is_placement(&self) -> bool {
        matches!(self, BookEvent::Placed { .. })
    }
}

/// In-memory event journal with sequence assignment
///
/// The sequence counter advances even when retention is disabled, so
/// sequence numbers stay gap-free across the book's lifetime.
#[derive(Debug)]
pub struct EventLog {
    next_sequence: u64,
    retain: bool,
    capacity: usize,
    events: VecDeque<BookEvent>,
}

impl EventLog {
    /// Create a log starting at `next_sequence`
    pub fn new(next_sequence: u64, retain: bool, capacity: usize) -> Self {
        Self {
            next_sequence,
            retain,
            capacity,
            events: VecDeque::new(),
        }
    }

    /// Reserve the next sequence number
    #[inline]
    pub fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Sequence the next event will receive
    #[inline]
    pub fn peek_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Store an event, evicting the oldest when full
    pub fn push(&mut self, event: BookEvent) {
        if !self.retain {
            return;
        }
        if self.capacity > 0 && self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Take all retained events
    pub fn drain(&mut self) -> Vec<BookEvent> {
        self.events.drain(..).collect()
    }

    /// Retained events with sequence strictly greater than `sequence`
    pub fn since(&self, sequence: u64) -> Vec<BookEvent> {
        self.events
            .iter()
            .filter(|event| event.sequence() > sequence)
            .cloned()
            .collect()
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing is retained
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
