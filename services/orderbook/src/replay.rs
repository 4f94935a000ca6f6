//! Deterministic replay of book events
//!
//! Rebuilds a book from an event stream, optionally on top of a snapshot.
//! Replay is strict:
//! - Sequences must be contiguous (already-applied sequences are skipped)
//! - Each placement must receive the id and net amount that was recorded
//! - Each cancellation must hit an active order with the recorded owner and net amount
//! - A rejected event leaves the book unchanged

use crate::core::OrderBook;
use crate::error::{BookError, BookResult};
use crate::events::BookEvent;
use crate::snapshot::BookSnapshot;
use book_common::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Counters for a replay run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStats {
    /// Events applied to the book
    pub events_applied: u64,
    /// Events skipped as already applied
    pub duplicates_skipped: u64,
    /// Placements applied
    pub placements: u64,
    /// Cancellations applied
    pub cancellations: u64,
}

/// Replay engine for deterministic book reconstruction
pub struct ReplayEngine {
    book: OrderBook,
    stats: ReplayStats,
}

impl ReplayEngine {
    /// Start from an empty book built from `config`
    pub fn new(config: &EngineConfig) -> BookResult<Self> {
        Ok(Self {
            book: OrderBook::from_config(config)?,
            stats: ReplayStats::default(),
        })
    }

    /// Start from a snapshot; only events after it will apply
    pub fn from_snapshot(snapshot: BookSnapshot, config: &EngineConfig) -> BookResult<Self> {
        Ok(Self {
            book: OrderBook::from_snapshot_with_config(snapshot, config)?,
            stats: ReplayStats::default(),
        })
    }

    /// Apply one event
    pub fn apply(&mut self, event: &BookEvent) -> BookResult<()> {
        let expected = self.book.next_sequence();
        let sequence = event.sequence();

        if sequence < expected {
            warn!("Skipping already-applied event {} (next is {})", sequence, expected);
            self.stats.duplicates_skipped += 1;
            return Ok(());
        }
        if sequence > expected {
            return Err(BookError::SequenceGap { expected, found: sequence });
        }

        // All checks precede the first mutation
        match event {
            BookEvent::Placed {
                side,
                order_id,
                owner,
                amount,
                net_amount,
                timestamp,
                ..
            } => {
                let computed = self.book.fees().net_of(*amount);
                if computed != *net_amount {
                    return Err(divergence(
                        sequence,
                        format!("net amount {computed} differs from recorded {net_amount}"),
                    ));
                }
                let next_id = self.book.next_order_id(*side);
                if next_id != *order_id {
                    return Err(divergence(
                        sequence,
                        format!("{side} placement would get id {next_id}, recorded {order_id}"),
                    ));
                }
                self.book.place_at(*side, owner.clone(), *amount, *timestamp)?;
                self.stats.placements += 1;
            }
            BookEvent::Cancelled {
                side,
                order_id,
                owner,
                net_amount,
                timestamp,
                ..
            } => {
                let Some(active) = self.book.get_order(*side, *order_id) else {
                    return Err(divergence(sequence, format!("{side} order {order_id} is not active")));
                };
                if active.owner != *owner || active.net_amount != *net_amount {
                    return Err(divergence(
                        sequence,
                        format!(
                            "{side} order {order_id} is held by {} for {}, recorded {owner} for {net_amount}",
                            active.owner, active.net_amount
                        ),
                    ));
                }
                self.book
                    .cancel_at(*side, *order_id, *timestamp)
                    .map_err(|e| divergence(sequence, e.to_string()))?;
                self.stats.cancellations += 1;
            }
        }

        self.stats.events_applied += 1;
        debug!(sequence, side = %event.side(), id = %event.order_id(), "Replayed event");
        Ok(())
    }

    /// Apply events in order, stopping at the first failure
    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a BookEvent>) -> BookResult<()> {
        for event in events {
            self.apply(event)?;
        }
        Ok(())
    }

    /// Book rebuilt so far
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Replay counters
    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// Finish and take the rebuilt book
    pub fn into_book(self) -> OrderBook {
        info!(
            "Replay complete: {} events applied, {} duplicates skipped",
            self.stats.events_applied, self.stats.duplicates_skipped
        );
        self.book
    }
}

fn divergence(sequence: u64, reason: String) -> BookError {
    BookError::ReplayDivergence { sequence, reason }
}

/// Rebuild a book from a complete event stream
pub fn rebuild(events: &[BookEvent], config: &EngineConfig) -> BookResult<OrderBook> {
    let mut engine = ReplayEngine::new(config)?;
    engine.apply_all(events)?;
    Ok(engine.into_book())
}
