//! Common constants shared by the book engine and its tooling
//!
//! Single source of truth for unit scales and fee defaults.

/// Wei per whole unit of the native currency (1 ether = 10^18 wei)
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Basis-point scale (100% = 10_000 bps)
pub const BP_SCALE: u32 = 10_000;

/// Percent to basis points (1% = 100 bps)
pub const PERCENT_TO_BP: u32 = 100;

/// Default placement fee: 5% of the deposited amount
pub const DEFAULT_FEE_BPS: u32 = 5 * PERCENT_TO_BP;

/// First id handed out on each side of the book
pub const FIRST_ORDER_ID: u64 = 1;

/// First event sequence number
pub const FIRST_SEQUENCE: u64 = 1;

/// Owner recorded when the caller does not identify itself
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// Prefix for environment overrides (`BOOK_FEE_BPS=250`)
pub const CONFIG_ENV_PREFIX: &str = "BOOK";

// Time constants

/// Nanoseconds per second
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Nanoseconds per millisecond
pub const NANOS_PER_MILLI: u64 = 1_000_000;
