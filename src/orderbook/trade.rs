//! Trade records produced by the matching engine.

use serde::Serialize;
use uuid::Uuid;

use super::order::{Order, OrderId, Side};
use crate::teams::TeamId;
use crate::utils::current_time_millis;

/// An executed trade between two orders.
///
/// Trades reference their orders by id, never by pointer: the book owns the
/// live order records and a trade is an immutable broadcast value once the
/// matcher emits it.
#[derive(Debug, Clone, Serialize)]
pub struct Trade {
    /// Unique trade identifier
    pub trade_id: Uuid,
    /// Instrument the trade occurred on
    pub symbol: String,
    /// Order id of the buying side
    pub buyer_order_id: OrderId,
    /// Order id of the selling side
    pub seller_order_id: OrderId,
    /// Team that bought
    pub buyer_team_id: TeamId,
    /// Team that sold
    pub seller_team_id: TeamId,
    /// Client-side id of the buying order, echoed on its reports
    pub buyer_client_order_id: Option<String>,
    /// Client-side id of the selling order, echoed on its reports
    pub seller_client_order_id: Option<String>,
    /// Execution price in cents (the resting order's price)
    pub price: u64,
    /// Executed quantity
    pub quantity: u64,
    /// Side of the order that crossed on arrival and caused the trade
    pub aggressor_side: Side,
    /// Wall-clock timestamp in milliseconds
    pub timestamp: u64,
}

impl Trade {
    /// Build a trade from an aggressing order and the resting order it hit.
    ///
    /// The buyer/seller mapping follows from the aggressor's side, and the
    /// execution price is the resting order's limit price, so price
    /// improvement accrues to the aggressor.
    pub fn between(aggressor: &Order, resting: &Order, price: u64, quantity: u64) -> Self {
        let (buyer, seller) = match aggressor.side {
            Side::Buy => (aggressor, resting),
            Side::Sell => (resting, aggressor),
        };
        Self {
            trade_id: Uuid::new_v4(),
            symbol: aggressor.symbol.clone(),
            buyer_order_id: buyer.id,
            seller_order_id: seller.id,
            buyer_team_id: buyer.team_id.clone(),
            seller_team_id: seller.team_id.clone(),
            buyer_client_order_id: buyer.client_order_id.clone(),
            seller_client_order_id: seller.client_order_id.clone(),
            price,
            quantity,
            aggressor_side: aggressor.side,
            timestamp: current_time_millis(),
        }
    }

    /// Build an auction trade between a buy and a sell order cleared at the
    /// auction price. The later-submitted order is treated as the aggressor
    /// for maker/taker attribution.
    pub fn at_auction(buyer: &Order, seller: &Order, price: u64, quantity: u64) -> Self {
        let aggressor_side = if buyer.submitted_at > seller.submitted_at {
            Side::Buy
        } else {
            Side::Sell
        };
        Self {
            trade_id: Uuid::new_v4(),
            symbol: buyer.symbol.clone(),
            buyer_order_id: buyer.id,
            seller_order_id: seller.id,
            buyer_team_id: buyer.team_id.clone(),
            seller_team_id: seller.team_id.clone(),
            buyer_client_order_id: buyer.client_order_id.clone(),
            seller_client_order_id: seller.client_order_id.clone(),
            price,
            quantity,
            aggressor_side,
            timestamp: current_time_millis(),
        }
    }

    /// Order id of the maker (resting) side of this trade.
    #[must_use]
    pub fn maker_order_id(&self) -> OrderId {
        match self.aggressor_side {
            Side::Buy => self.seller_order_id,
            Side::Sell => self.buyer_order_id,
        }
    }

    /// Order id of the taker (aggressing) side of this trade.
    #[must_use]
    pub fn taker_order_id(&self) -> OrderId {
        match self.aggressor_side {
            Side::Buy => self.buyer_order_id,
            Side::Sell => self.seller_order_id,
        }
    }

    /// Team on the given side of this trade.
    #[must_use]
    pub fn team_on(&self, side: Side) -> &TeamId {
        match side {
            Side::Buy => &self.buyer_team_id,
            Side::Sell => &self.seller_team_id,
        }
    }

    /// Order id on the given side of this trade.
    #[must_use]
    pub fn order_on(&self, side: Side) -> OrderId {
        match side {
            Side::Buy => self.buyer_order_id,
            Side::Sell => self.seller_order_id,
        }
    }

    /// Client order id on the given side of this trade.
    #[must_use]
    pub fn client_id_on(&self, side: Side) -> Option<&String> {
        match side {
            Side::Buy => self.buyer_client_order_id.as_ref(),
            Side::Sell => self.seller_client_order_id.as_ref(),
        }
    }
}

/// Result of inserting one order into the book.
///
/// Carries the trades generated by immediate matches, the ids of resting
/// orders that were completely filled, and the final state of the incoming
/// order after matching and (for limit residuals) resting.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Final state of the incoming order
    pub order: Order,
    /// Trades generated, in execution order
    pub trades: Vec<Trade>,
    /// Resting orders fully exhausted by this insert, in fill order
    pub filled_order_ids: Vec<OrderId>,
    /// Whether the incoming order was completely executed
    pub is_complete: bool,
}

impl MatchResult {
    /// A result with no trades for an order that rested (or was discarded)
    /// untouched.
    pub fn unmatched(order: Order) -> Self {
        Self {
            order,
            trades: Vec::new(),
            filled_order_ids: Vec::new(),
            is_complete: false,
        }
    }

    /// Quantity executed for the incoming order.
    #[must_use]
    pub fn executed_quantity(&self) -> u64 {
        self.trades.iter().map(|t| t.quantity).sum()
    }
}
