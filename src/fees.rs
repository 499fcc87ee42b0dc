//! Fee schedule implementation for per-role trading fees.

use serde::{Deserialize, Serialize};

/// Configurable fee schedule for maker and taker sides of a trade.
///
/// Rates are expressed in cents per contract. Positive values are credits
/// paid to the team, negative values are charges: a maker rebate is
/// positive, a taker fee is negative.
///
/// # Examples
///
/// ```
/// use optex_rs::FeeSchedule;
///
/// // Market-maker schedule: +$0.02 per contract made, -$0.01 taken.
/// let schedule = FeeSchedule::new(2, -1);
///
/// // A 5-lot resting fill earns the maker $0.10.
/// assert_eq!(schedule.calculate_fee(5, true), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Maker rate in cents per contract (positive = rebate)
    pub maker_rate_cents: i64,

    /// Taker rate in cents per contract (negative = fee)
    pub taker_rate_cents: i64,
}

impl FeeSchedule {
    /// Create a new fee schedule.
    ///
    /// # Arguments
    ///
    /// * `maker_rate_cents` - Maker rate per contract (positive for rebates)
    /// * `taker_rate_cents` - Taker rate per contract (negative for fees)
    #[must_use = "FeeSchedule does nothing unless used"]
    pub fn new(maker_rate_cents: i64, taker_rate_cents: i64) -> Self {
        Self {
            maker_rate_cents,
            taker_rate_cents,
        }
    }

    /// Calculate the fee for one side of a trade.
    ///
    /// # Arguments
    ///
    /// * `quantity` - Contracts executed
    /// * `is_maker` - true for the resting side, false for the aggressor
    ///
    /// # Returns
    ///
    /// The signed fee in cents: positive values are credits to the team,
    /// negative values are charges.
    #[must_use = "Fee calculation result must be used"]
    #[inline]
    pub fn calculate_fee(&self, quantity: u64, is_maker: bool) -> i64 {
        let rate = if is_maker {
            self.maker_rate_cents
        } else {
            self.taker_rate_cents
        };
        rate.saturating_mul(quantity as i64)
    }

    /// Whether this schedule credits makers for adding liquidity.
    #[must_use]
    #[inline]
    pub fn has_maker_rebate(&self) -> bool {
        self.maker_rate_cents > 0
    }

    /// Create a zero-fee schedule.
    #[must_use]
    pub fn zero_fee() -> Self {
        Self::new(0, 0)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::zero_fee()
    }
}
