//! Order book operations: inserting and cancelling orders.

use tracing::trace;

use super::book::OrderBook;
use super::error::OrderBookError;
use super::order::{Order, OrderStatus};
use super::trade::MatchResult;
use crate::teams::TeamId;

impl OrderBook {
    /// Insert an order into the book.
    ///
    /// A crossing order matches repeatedly against the best opposite level
    /// until it is exhausted or no crossing level remains; any limit
    /// residual then rests at its limit price with its original
    /// `submitted_at` as time priority. Market residual is cancelled.
    ///
    /// # Errors
    /// Returns [`OrderBookError::ZeroQuantity`] or
    /// [`OrderBookError::SymbolMismatch`] without touching the book.
    pub fn insert(&mut self, mut order: Order) -> Result<MatchResult, OrderBookError> {
        self.validate_incoming(&order)?;
        trace!(
            "inserting order {} {} {} x {:?} on {}",
            order.id, order.side, order.quantity, order.price, self.symbol
        );
        let (trades, filled_order_ids) = self.match_incoming(&mut order);
        self.settle_residual(&mut order);
        Ok(Self::build_result(order, trades, filled_order_ids))
    }

    /// Place an order at its limit price without matching.
    ///
    /// Used while matching is disabled: buffered orders land resting so the
    /// opening auction can clear them in one batch. The book may be crossed
    /// after this call; the auction restores the invariant.
    ///
    /// # Errors
    /// Returns [`OrderBookError::MarketOrderCannotRest`] for market orders,
    /// plus the same validation errors as [`Self::insert`].
    pub fn insert_resting(&mut self, order: Order) -> Result<(), OrderBookError> {
        self.validate_incoming(&order)?;
        trace!(
            "resting order {} {} {} @ {:?} on {} without matching",
            order.id, order.side, order.quantity, order.price, self.symbol
        );
        self.rest_order(order)
    }

    /// Cancel a resting order.
    ///
    /// Only the originating team may cancel. Returns the cancelled order
    /// with its status updated.
    ///
    /// # Errors
    /// [`OrderBookError::OrderNotFound`] when the order is not resting
    /// (unknown, already filled, or already cancelled);
    /// [`OrderBookError::NotOwner`] when `team_id` did not submit it.
    pub fn cancel(&mut self, order_id: super::order::OrderId, team_id: &TeamId) -> Result<Order, OrderBookError> {
        let (price, side) = *self
            .order_locations
            .get(&order_id)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;

        {
            let level = self
                .side_levels(side)
                .get(&price)
                .ok_or(OrderBookError::OrderNotFound(order_id))?;
            let order = level
                .get(order_id)
                .ok_or(OrderBookError::OrderNotFound(order_id))?;
            if &order.team_id != team_id {
                return Err(OrderBookError::NotOwner {
                    order_id,
                    team_id: team_id.clone(),
                });
            }
        }

        let mut order = self
            .side_levels_mut(side)
            .get_mut(&price)
            .and_then(|level| level.remove(order_id))
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        self.order_locations.remove(&order_id);
        self.prune_level(side, price);
        order.status = OrderStatus::Cancelled;
        trace!("cancelled order {} on {}", order_id, self.symbol);
        Ok(order)
    }
}
