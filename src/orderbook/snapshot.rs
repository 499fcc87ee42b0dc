//! Read-only depth snapshots of the book.

use serde::Serialize;

/// One aggregated price level in a depth snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthLevel {
    /// Level price in cents
    pub price: u64,
    /// Total resting quantity at this level
    pub quantity: u64,
    /// Number of resting orders at this level
    pub order_count: usize,
}

/// Top-of-book snapshot: the best n levels on each side, best first.
#[derive(Debug, Clone, Serialize)]
pub struct DepthSnapshot {
    /// The symbol this snapshot describes
    pub symbol: String,
    /// Bid levels, highest price first
    pub bids: Vec<DepthLevel>,
    /// Ask levels, lowest price first
    pub asks: Vec<DepthLevel>,
}

impl DepthSnapshot {
    /// Best bid level, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    /// Best ask level, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }
}
