//! # Sorted Bid/Ask Book Engine
//!
//! Maintains two independently ordered ladders of resting orders:
//! - Bids ranked by descending deposit, asks by ascending deposit
//! - Stable per-side placement ids that survive cancellation of others
//! - A flat placement fee withheld from every deposit
//! - Sequenced events, an on-disk journal, snapshots and strict replay
//!
//! ## Core Design Principles
//!
//! 1. **Explicit ownership**: one `OrderBook` value owns both sides
//! 2. **Per-side locking**: mutations on a side are serialized, reads see a whole side
//! 3. **All-or-nothing operations**: a failed call leaves the book untouched
//! 4. **Deterministic behavior**: replaying the journal rebuilds an identical book

#![warn(missing_docs)]

pub mod core;
pub mod error;
pub mod events;
pub mod fees;
pub mod journal;
pub mod metrics;
pub mod replay;
pub mod snapshot;

// Re-exports for convenience
pub use crate::core::{Order, OrderBook, Side};
pub use crate::error::{BookError, BookResult};
pub use crate::events::BookEvent;
pub use crate::fees::FeeSchedule;
pub use crate::journal::Journal;
pub use crate::metrics::{BookMetrics, MetricsSnapshot};
pub use crate::replay::{ReplayEngine, ReplayStats};
pub use crate::snapshot::BookSnapshot;
pub use book_common::{AccountId, Amount, EngineConfig, OrderId, Ts};
