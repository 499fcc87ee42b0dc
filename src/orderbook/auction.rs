//! Opening-auction clearing: a single batch cross for orders collected
//! while continuous matching was disabled.

use tracing::{debug, trace};

use super::book::OrderBook;
use super::order::{Order, OrderId, Side};
use super::trade::Trade;

/// Outcome of one auction run on a single book.
#[derive(Debug, Clone)]
pub struct AuctionResult {
    /// The price every auction trade executed at, in cents
    pub clearing_price: u64,
    /// Trades generated by the cross, in priority order
    pub trades: Vec<Trade>,
    /// Orders fully exhausted by the auction
    pub filled_order_ids: Vec<OrderId>,
}

impl OrderBook {
    /// Run the opening auction on this book.
    ///
    /// The clearing price is the candidate price maximising matched volume;
    /// ties break by minimum |demand − supply|, then by the midpoint of the
    /// tied range (integer division floors to the tick). Eligible orders
    /// fill against each other in price-time priority at the clearing
    /// price; unmatched quantity remains resting.
    ///
    /// Returns `None` when the book is not crossed (nothing to clear).
    pub fn run_auction(&mut self) -> Option<AuctionResult> {
        let best_bid = self.best_bid()?;
        let best_ask = self.best_ask()?;
        if best_bid < best_ask {
            return None;
        }

        let clearing_price = self.clearing_price()?;
        debug!(
            "auction on {}: clearing price {} (book {}x{})",
            self.symbol, clearing_price, best_bid, best_ask
        );

        // Pull every eligible order off the book, fill in priority order,
        // then rest the residuals back. Draining first keeps the borrow
        // structure simple and leaves the book consistent on every path.
        let mut buys = self.drain_eligible(Side::Buy, clearing_price);
        let mut sells = self.drain_eligible(Side::Sell, clearing_price);

        let mut trades = Vec::new();
        let mut filled_order_ids = Vec::new();
        let (mut bi, mut si) = (0usize, 0usize);
        while bi < buys.len() && si < sells.len() {
            let fill = buys[bi]
                .remaining_quantity
                .min(sells[si].remaining_quantity);
            let trade = Trade::at_auction(&buys[bi], &sells[si], clearing_price, fill);
            trace!(
                "auction trade {} on {}: {} @ {}",
                trade.trade_id, self.symbol, fill, clearing_price
            );
            trades.push(trade);
            buys[bi].apply_fill(fill);
            sells[si].apply_fill(fill);
            if buys[bi].remaining_quantity == 0 {
                filled_order_ids.push(buys[bi].id);
                bi += 1;
            }
            if sells[si].remaining_quantity == 0 {
                filled_order_ids.push(sells[si].id);
                si += 1;
            }
        }

        for residual in buys.into_iter().chain(sells).filter(|o| o.remaining_quantity > 0) {
            self.rest_order(residual)
                .expect("auction participants are limit orders");
        }

        if let Some(last) = trades.last() {
            self.last_trade_price = Some(last.price);
        }
        debug_assert!(!self.is_crossed());

        Some(AuctionResult {
            clearing_price,
            trades,
            filled_order_ids,
        })
    }

    /// Candidate-price walk: every distinct resting limit price, scored by
    /// (matched volume, imbalance). Returns `None` on an empty side.
    fn clearing_price(&self) -> Option<u64> {
        let mut candidates: Vec<u64> = self.bids.keys().chain(self.asks.keys()).copied().collect();
        candidates.sort_unstable();
        candidates.dedup();

        let mut best: Option<(u64, u64, Vec<u64>)> = None; // (volume, imbalance, tied prices)
        for &price in &candidates {
            let demand: u64 = self
                .bids
                .range(price..)
                .map(|(_, level)| level.total_quantity())
                .sum();
            let supply: u64 = self
                .asks
                .range(..=price)
                .map(|(_, level)| level.total_quantity())
                .sum();
            let volume = demand.min(supply);
            if volume == 0 {
                continue;
            }
            let imbalance = demand.abs_diff(supply);
            match &mut best {
                None => best = Some((volume, imbalance, vec![price])),
                Some((best_volume, best_imbalance, tied)) => {
                    if volume > *best_volume
                        || (volume == *best_volume && imbalance < *best_imbalance)
                    {
                        *best_volume = volume;
                        *best_imbalance = imbalance;
                        tied.clear();
                        tied.push(price);
                    } else if volume == *best_volume && imbalance == *best_imbalance {
                        tied.push(price);
                    }
                }
            }
        }

        best.map(|(_, _, tied)| {
            let lo = *tied.first().expect("tied set is never empty");
            let hi = *tied.last().expect("tied set is never empty");
            (lo + hi) / 2
        })
    }

    /// Remove all orders eligible at the clearing price from one side,
    /// returned in price-time priority.
    fn drain_eligible(&mut self, side: Side, clearing_price: u64) -> Vec<Order> {
        let eligible_prices: Vec<u64> = match side {
            Side::Buy => self.bids.range(clearing_price..).map(|(p, _)| *p).collect(),
            Side::Sell => self.asks.range(..=clearing_price).map(|(p, _)| *p).collect(),
        };

        let mut orders = Vec::new();
        // Best price first: highest bids, lowest asks.
        let iter: Box<dyn Iterator<Item = &u64>> = match side {
            Side::Buy => Box::new(eligible_prices.iter().rev()),
            Side::Sell => Box::new(eligible_prices.iter()),
        };
        for &price in iter {
            if let Some(mut level) = self.side_levels_mut(side).remove(&price) {
                while let Some(order) = level.pop_front() {
                    self.order_locations.remove(&order.id);
                    orders.push(order);
                }
            }
        }
        orders
    }
}
