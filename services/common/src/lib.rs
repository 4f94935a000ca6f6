//! Shared types and configuration for the sorted bid/ask book
//!
//! Everything here is plain data: amounts, identifiers, timestamps and the
//! engine configuration. The engine itself lives in `orderbook-engine`.

pub mod config;
pub mod constants;
pub mod types;

pub use config::*;
pub use constants::*;
pub use types::*;
