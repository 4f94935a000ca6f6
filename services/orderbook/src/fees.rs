//! Placement fee schedule
//!
//! A flat rate in basis points is withheld from every deposit. The net
//! amount is floored to whole wei and computed without widening, so it is
//! defined for every `u128` deposit.

use crate::error::{BookError, BookResult};
use book_common::{Amount, BP_SCALE, DEFAULT_FEE_BPS};
use serde::{Deserialize, Serialize};

/// Flat fee withheld at placement time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    fee_bps: u32,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
        }
    }
}

impl FeeSchedule {
    /// Create a schedule, rejecting rates above 100%
    pub fn new(fee_bps: u32) -> BookResult<Self> {
        if fee_bps > BP_SCALE {
            return Err(BookError::InvalidFee { fee_bps });
        }
        Ok(Self { fee_bps })
    }

    /// Schedule that withholds nothing
    #[must_use]
    pub const fn zero() -> Self {
        Self { fee_bps: 0 }
    }

    /// Fee rate in basis points
    #[inline]
    #[must_use]
    pub const fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// Amount credited to the book for a deposit
    #[inline]
    #[must_use]
    pub fn net_of(&self, amount: Amount) -> Amount {
        let scale = u128::from(BP_SCALE);
        let keep = u128::from(BP_SCALE - self.fee_bps);
        let wei = amount.as_wei();
        // floor(wei * keep / scale) split so neither product can overflow
        let (quot, rem) = (wei / scale, wei % scale);
        Amount::from_wei(quot * keep + rem * keep / scale)
    }

    /// Amount withheld from a deposit
    #[inline]
    #[must_use]
    pub fn fee_of(&self, amount: Amount) -> Amount {
        amount.saturating_sub(self.net_of(amount))
    }
}
