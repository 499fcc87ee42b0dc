//! Order records and the identifiers attached to them.
//!
//! Prices are integers in cents, so the $0.01 tick is the unit of the
//! price axis and every representable price is on-tick by construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::teams::TeamId;

/// Server-assigned order identifier, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential generator for [`OrderId`]s. One instance lives in the server
/// state; ids are assigned at ingress, before the order enters the pipeline.
#[derive(Debug)]
pub struct OrderIdGenerator {
    next: AtomicU64,
}

impl OrderIdGenerator {
    /// Create a generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next order id.
    pub fn next_id(&self) -> OrderId {
        OrderId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for OrderIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Which side of the book an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Bid side
    Buy,
    /// Ask side
    Sell,
}

impl Side {
    /// The opposite side of the book.
    #[must_use]
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Signed direction of this side: +1 for buys, -1 for sells.
    #[must_use]
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Lifecycle state of an order.
///
/// `Filled` holds exactly when `remaining_quantity == 0` and at least one
/// fill occurred. Market-order residual that cannot execute is `Cancelled`,
/// never resting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted, no fills yet
    New,
    /// Some fills, quantity remains
    PartiallyFilled,
    /// Fully executed
    Filled,
    /// Removed before completion (user cancel or market residual)
    Cancelled,
    /// Refused by the validator; never reached the book
    Rejected,
}

impl OrderStatus {
    /// Whether the order can no longer trade.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "new",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// A single order as tracked by the exchange.
///
/// `price` is `None` for market orders. `submitted_at` is the validator's
/// monotonic stamp and is the time-priority key inside a price level; it is
/// preserved across partial fills so a resting order never loses its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Server-assigned identifier
    pub id: OrderId,
    /// Opaque client-side identifier, echoed back on every message
    pub client_order_id: Option<String>,
    /// Owning team
    pub team_id: TeamId,
    /// Instrument symbol this order trades
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Original quantity, always positive
    pub quantity: u64,
    /// Limit price in cents; `None` means market order
    pub price: Option<u64>,
    /// Monotonic submission stamp in nanoseconds (time priority)
    pub submitted_at: u64,
    /// Quantity not yet executed, in `[0, quantity]`
    pub remaining_quantity: u64,
    /// Current lifecycle state
    pub status: OrderStatus,
}

impl Order {
    /// Create a freshly accepted order with no fills.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        client_order_id: Option<String>,
        team_id: TeamId,
        symbol: impl Into<String>,
        side: Side,
        quantity: u64,
        price: Option<u64>,
        submitted_at: u64,
    ) -> Self {
        Self {
            id,
            client_order_id,
            team_id,
            symbol: symbol.into(),
            side,
            quantity,
            price,
            submitted_at,
            remaining_quantity: quantity,
            status: OrderStatus::New,
        }
    }

    /// Whether this is a market order.
    #[must_use]
    pub fn is_market(&self) -> bool {
        self.price.is_none()
    }

    /// Quantity executed so far.
    #[must_use]
    pub fn executed_quantity(&self) -> u64 {
        self.quantity - self.remaining_quantity
    }

    /// Apply a fill of `quantity` units, updating remaining quantity and
    /// status. Panics in debug builds if the fill exceeds what remains.
    pub fn apply_fill(&mut self, quantity: u64) {
        debug_assert!(quantity <= self.remaining_quantity);
        self.remaining_quantity -= quantity;
        self.status = if self.remaining_quantity == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}
