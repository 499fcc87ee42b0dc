//! Contains the core matching engine logic for the order book.

use tracing::trace;

use super::book::OrderBook;
use super::order::{Order, OrderId, OrderStatus, Side};
use super::trade::{MatchResult, Trade};

impl OrderBook {
    /// Match an incoming order against the opposite side of the book.
    ///
    /// Walks price levels from the best opposite price while the order
    /// still crosses, filling resting orders front-to-back within each
    /// level so earlier submissions exhaust before later ones see any
    /// quantity. Every trade executes at the resting order's price.
    ///
    /// Returns the trades generated and the ids of resting orders fully
    /// exhausted; the caller decides what to do with the residual.
    pub(super) fn match_incoming(&mut self, order: &mut Order) -> (Vec<Trade>, Vec<OrderId>) {
        let mut trades = Vec::new();
        let mut filled_order_ids = Vec::new();

        while order.remaining_quantity > 0 {
            // Borrow the two touched fields directly so level mutation and
            // the location index can proceed side by side.
            let opposite_levels = match order.side {
                Side::Buy => &mut self.asks,
                Side::Sell => &mut self.bids,
            };
            let best_price = match order.side {
                Side::Buy => opposite_levels.keys().next().copied(),
                Side::Sell => opposite_levels.keys().next_back().copied(),
            };
            let Some(level_price) = best_price else {
                break;
            };

            // A limit order only crosses while the opposite best is at or
            // through its limit; market orders take every level.
            if let Some(limit) = order.price {
                let crosses = match order.side {
                    Side::Buy => level_price <= limit,
                    Side::Sell => level_price >= limit,
                };
                if !crosses {
                    break;
                }
            }

            let level = opposite_levels
                .get_mut(&level_price)
                .expect("best price key must have a level");

            while order.remaining_quantity > 0 {
                let Some(resting) = level.front_mut() else {
                    break;
                };
                let fill = order.remaining_quantity.min(resting.remaining_quantity);
                resting.apply_fill(fill);
                let trade = Trade::between(order, resting, level_price, fill);
                order.apply_fill(fill);
                trace!(
                    "trade {}: {} @ {} (aggressor {})",
                    trade.trade_id, fill, level_price, order.side
                );
                trades.push(trade);

                if level.front().map(|o| o.remaining_quantity == 0).unwrap_or(false) {
                    let exhausted = level.pop_front().expect("front exists");
                    self.order_locations.remove(&exhausted.id);
                    filled_order_ids.push(exhausted.id);
                }
            }

            if level.is_empty() {
                opposite_levels.remove(&level_price);
            }
        }

        if let Some(last) = trades.last() {
            self.last_trade_price = Some(last.price);
        }
        (trades, filled_order_ids)
    }

    /// Finish an insert: rest a limit residual, or cancel a market residual
    /// (market orders never rest).
    pub(super) fn settle_residual(&mut self, order: &mut Order) {
        if order.remaining_quantity == 0 {
            return;
        }
        if order.is_market() {
            order.status = OrderStatus::Cancelled;
            trace!(
                "market order {} cancelled with {} unfilled",
                order.id, order.remaining_quantity
            );
        } else {
            self.rest_order(order.clone())
                .expect("limit residual always has a price");
        }
    }

    pub(super) fn build_result(
        order: Order,
        trades: Vec<Trade>,
        filled_order_ids: Vec<OrderId>,
    ) -> MatchResult {
        let is_complete = order.remaining_quantity == 0;
        MatchResult {
            order,
            trades,
            filled_order_ids,
            is_complete,
        }
    }
}
