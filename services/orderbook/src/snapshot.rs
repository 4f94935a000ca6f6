//! Point-in-time book snapshots
//!
//! A snapshot carries both ladders, the per-side id counters, the event
//! sequence and the fee rate, sealed with a CRC32 over the canonical book
//! state. Restoring a snapshot yields a book that answers every query the
//! same way and continues the same id and sequence streams.

use crate::core::{Order, OrderBook, Side, SideBook};
use crate::error::{BookError, BookResult};
use crate::events::EventLog;
use crate::fees::FeeSchedule;
use book_common::{EngineConfig, Ts};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Serializable book state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// Bids in rank order
    pub bids: Vec<Order>,
    /// Asks in rank order
    pub asks: Vec<Order>,
    /// Next bid id
    pub next_bid_id: u64,
    /// Next ask id
    pub next_ask_id: u64,
    /// Sequence the next event will receive
    pub next_sequence: u64,
    /// Fee rate the orders were placed under
    pub fee_bps: u32,
    /// Capture time
    pub taken_at: Ts,
    /// CRC32 over the canonical state
    pub checksum: u32,
}

impl BookSnapshot {
    /// Recompute the checksum from the carried state
    #[must_use]
    pub fn compute_checksum(&self) -> u32 {
        state_checksum(&self.bids, &self.asks, self.next_bid_id, self.next_ask_id, self.fee_bps)
    }

    /// True when the stored checksum matches the carried state
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.checksum == self.compute_checksum()
    }
}

/// CRC32 over ids, owners, amounts, id counters and fee rate
///
/// Timestamps and the event sequence are not part of the book state.
fn state_checksum(bids: &[Order], asks: &[Order], next_bid_id: u64, next_ask_id: u64, fee_bps: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&fee_bps.to_le_bytes());
    for (tag, next_id, orders) in [(0u8, next_bid_id, bids), (1u8, next_ask_id, asks)] {
        hasher.update(&[tag]);
        hasher.update(&next_id.to_le_bytes());
        hasher.update(&(orders.len() as u64).to_le_bytes());
        for order in orders {
            hasher.update(&order.id.as_u64().to_le_bytes());
            hasher.update(&order.amount.as_wei().to_le_bytes());
            hasher.update(&order.net_amount.as_wei().to_le_bytes());
            let owner = order.owner.as_str().as_bytes();
            hasher.update(&(owner.len() as u64).to_le_bytes());
            hasher.update(owner);
        }
    }
    hasher.finalize()
}

impl OrderBook {
    /// Capture a consistent snapshot of both sides
    pub fn snapshot(&self) -> BookSnapshot {
        // Lock order: bids, asks, journal
        let bids = self.side_book(Side::Bid).read();
        let asks = self.side_book(Side::Ask).read();
        let next_sequence = self.journal().lock().peek_sequence();

        let bid_orders: Vec<Order> = bids.iter().cloned().collect();
        let ask_orders: Vec<Order> = asks.iter().cloned().collect();
        let fee_bps = self.fees().fee_bps();
        let checksum = state_checksum(&bid_orders, &ask_orders, bids.next_id(), asks.next_id(), fee_bps);

        BookSnapshot {
            bids: bid_orders,
            asks: ask_orders,
            next_bid_id: bids.next_id(),
            next_ask_id: asks.next_id(),
            next_sequence,
            fee_bps,
            taken_at: Ts::now(),
            checksum,
        }
    }

    /// CRC32 of the current book state
    pub fn checksum(&self) -> u32 {
        let bids = self.side_book(Side::Bid).read();
        let asks = self.side_book(Side::Ask).read();
        let bid_orders: Vec<Order> = bids.iter().cloned().collect();
        let ask_orders: Vec<Order> = asks.iter().cloned().collect();
        state_checksum(&bid_orders, &ask_orders, bids.next_id(), asks.next_id(), self.fees().fee_bps())
    }

    /// Restore a book with default journaling
    pub fn from_snapshot(snapshot: BookSnapshot) -> BookResult<Self> {
        Self::from_snapshot_with_config(snapshot, &EngineConfig::default())
    }

    /// Restore a book, taking journal settings from `config`
    ///
    /// The fee rate always comes from the snapshot so restored net amounts
    /// stay consistent with the orders they describe.
    pub fn from_snapshot_with_config(snapshot: BookSnapshot, config: &EngineConfig) -> BookResult<Self> {
        if !snapshot.is_valid() {
            return Err(BookError::Corrupted {
                reason: format!(
                    "snapshot checksum mismatch: stored {:#010x}, computed {:#010x}",
                    snapshot.checksum,
                    snapshot.compute_checksum()
                ),
            });
        }

        let fees = FeeSchedule::new(snapshot.fee_bps)?;
        let bids = restore_side(Side::Bid, snapshot.bids, snapshot.next_bid_id, fees)?;
        let asks = restore_side(Side::Ask, snapshot.asks, snapshot.next_ask_id, fees)?;

        debug!(
            bids = bids.len(),
            asks = asks.len(),
            next_sequence = snapshot.next_sequence,
            "Restored book from snapshot"
        );

        Ok(Self::from_parts(
            bids,
            asks,
            fees,
            EventLog::new(
                snapshot.next_sequence.max(1),
                config.journal_events,
                config.max_journal_events,
            ),
        ))
    }
}

fn restore_side(side: Side, orders: Vec<Order>, next_id: u64, fees: FeeSchedule) -> BookResult<SideBook> {
    let mut book = SideBook::with_next_id(side, next_id);
    let mut seen = HashSet::with_capacity(orders.len());

    for order in orders {
        if order.side != side {
            return Err(corrupted(format!("order {} filed under {side} but marked {}", order.id, order.side)));
        }
        if order.id.as_u64() >= next_id || !seen.insert(order.id) {
            return Err(corrupted(format!("{side} order id {} is duplicated or beyond next id {next_id}", order.id)));
        }
        if order.amount.is_zero() || order.net_amount != fees.net_of(order.amount) {
            return Err(corrupted(format!("{side} order {} has inconsistent amounts", order.id)));
        }
        book.insert(order);
    }

    Ok(book)
}

fn corrupted(reason: String) -> BookError {
    BookError::Corrupted { reason }
}

/// Write a snapshot to `path`, replacing it atomically
pub fn save_snapshot(path: &Path, snapshot: &BookSnapshot) -> BookResult<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        bincode::serialize_into(&mut writer, snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    info!(
        "Saved snapshot to {} ({} bids, {} asks)",
        path.display(),
        snapshot.bids.len(),
        snapshot.asks.len()
    );
    Ok(())
}

/// Read a snapshot from `path`
pub fn load_snapshot(path: &Path) -> BookResult<BookSnapshot> {
    let reader = BufReader::new(File::open(path)?);
    let snapshot: BookSnapshot = bincode::deserialize_from(reader)?;
    debug!("Loaded snapshot from {}", path.display());
    Ok(snapshot)
}
