//! Error types for the book engine

use crate::core::Side;
use book_common::{Amount, OrderId};
use thiserror::Error;

/// Book engine error types
#[derive(Error, Debug)]
pub enum BookError {
    /// Deposit was zero
    #[error("Invalid amount: {amount} (deposits must be positive)")]
    InvalidAmount {
        /// The rejected deposit
        amount: Amount,
    },

    /// No active order with this id on the addressed side
    #[error("Order not found: {side} #{order_id}")]
    OrderNotFound {
        /// Side that was searched
        side: Side,
        /// The identifier that missed
        order_id: OrderId,
    },

    /// Fee rate outside 0..=10_000 bps
    #[error("Invalid fee rate: {fee_bps} bps")]
    InvalidFee {
        /// The rejected rate
        fee_bps: u32,
    },

    /// Event stream skipped or repeated a sequence number
    #[error("Sequence gap: expected {expected}, found {found}")]
    SequenceGap {
        /// Next sequence the book expected
        expected: u64,
        /// Sequence carried by the event
        found: u64,
    },

    /// Replaying an event produced a different result than was recorded
    #[error("Replay diverged at sequence {sequence}: {reason}")]
    ReplayDivergence {
        /// Sequence of the offending event
        sequence: u64,
        /// What differed
        reason: String,
    },

    /// Stored data failed an integrity check
    #[error("Corrupted data: {reason}")]
    Corrupted {
        /// What failed to validate
        reason: String,
    },

    /// Journal or snapshot file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding error
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Type alias for book results
pub type BookResult<T> = Result<T, BookError>;
