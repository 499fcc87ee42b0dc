//! Core order book: per-instrument price levels and fast lookups.

use std::collections::{BTreeMap, HashMap};

use super::error::OrderBookError;
use super::level::PriceLevel;
use super::order::{Order, OrderId, Side};
use super::snapshot::{DepthLevel, DepthSnapshot};

/// Price-time priority order book for a single instrument.
///
/// Bids and asks are kept in ordered maps keyed by price in cents; each
/// level holds its resting orders in submission order. The book is
/// exclusively owned by the matcher task, which is the sole mutator of all
/// books, so no interior locking is needed.
///
/// Invariant: the book is never crossed at rest. `insert` matches away any
/// cross before the residual rests, so after every operation
/// `best_bid() < best_ask()` whenever both exist.
#[derive(Debug)]
pub struct OrderBook {
    /// The symbol this book trades
    pub(super) symbol: String,

    /// Bid side levels; best bid is the highest key
    pub(super) bids: BTreeMap<u64, PriceLevel>,

    /// Ask side levels; best ask is the lowest key
    pub(super) asks: BTreeMap<u64, PriceLevel>,

    /// Order id -> (price, side) for O(1) cancel lookups
    pub(super) order_locations: HashMap<OrderId, (u64, Side)>,

    /// The last price at which a trade occurred
    pub(super) last_trade_price: Option<u64>,
}

impl OrderBook {
    /// Create a new, empty order book for the given symbol.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            order_locations: HashMap::new(),
            last_trade_price: None,
        }
    }

    /// Get the symbol of this order book.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Get the best bid price, if any.
    pub fn best_bid(&self) -> Option<u64> {
        self.bids.keys().next_back().copied()
    }

    /// Get the best ask price, if any.
    pub fn best_ask(&self) -> Option<u64> {
        self.asks.keys().next().copied()
    }

    /// Get the mid price (average of best bid and best ask), in cents.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid as f64 + ask as f64) / 2.0),
            _ => None,
        }
    }

    /// Get the last trade price, if any trade has occurred.
    pub fn last_trade_price(&self) -> Option<u64> {
        self.last_trade_price
    }

    /// Number of live orders resting in the book.
    pub fn open_order_count(&self) -> usize {
        self.order_locations.len()
    }

    /// Whether an order currently rests in this book.
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.order_locations.contains_key(&order_id)
    }

    /// Borrow a resting order by id.
    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        let (price, side) = self.order_locations.get(&order_id)?;
        self.side_levels(*side).get(price)?.get(order_id)
    }

    /// Snapshot of the top `depth` levels on both sides.
    pub fn depth(&self, depth: usize) -> DepthSnapshot {
        fn aggregate<'a>(
            iter: impl Iterator<Item = (&'a u64, &'a PriceLevel)>,
            depth: usize,
        ) -> Vec<DepthLevel> {
            iter.take(depth)
                .map(|(price, level)| DepthLevel {
                    price: *price,
                    quantity: level.total_quantity(),
                    order_count: level.order_count(),
                })
                .collect()
        }
        DepthSnapshot {
            symbol: self.symbol.clone(),
            bids: aggregate(self.bids.iter().rev(), depth),
            asks: aggregate(self.asks.iter(), depth),
        }
    }

    /// Whether the book is crossed at rest (test hook; must always be false
    /// after a completed operation).
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    pub(super) fn side_levels(&self, side: Side) -> &BTreeMap<u64, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub(super) fn side_levels_mut(&mut self, side: Side) -> &mut BTreeMap<u64, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Place an order at its limit price without matching. Auction preamble
    /// and residual resting both go through here.
    pub(super) fn rest_order(&mut self, order: Order) -> Result<(), OrderBookError> {
        let price = order
            .price
            .ok_or(OrderBookError::MarketOrderCannotRest(order.id))?;
        self.order_locations.insert(order.id, (price, order.side));
        self.side_levels_mut(order.side)
            .entry(price)
            .or_default()
            .push(order);
        Ok(())
    }

    /// Remove a level if it has no orders left.
    pub(super) fn prune_level(&mut self, side: Side, price: u64) {
        let levels = self.side_levels_mut(side);
        if levels.get(&price).map(PriceLevel::is_empty).unwrap_or(false) {
            levels.remove(&price);
        }
    }

    pub(super) fn validate_incoming(&self, order: &Order) -> Result<(), OrderBookError> {
        if order.symbol != self.symbol {
            return Err(OrderBookError::SymbolMismatch {
                order_id: order.id,
                order_symbol: order.symbol.clone(),
                book_symbol: self.symbol.clone(),
            });
        }
        if order.quantity == 0 {
            return Err(OrderBookError::ZeroQuantity(order.id));
        }
        Ok(())
    }
}
