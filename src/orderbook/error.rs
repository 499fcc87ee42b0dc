//! Order book error types

use thiserror::Error;

use super::order::OrderId;

/// Errors that can occur within the order book.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum OrderBookError {
    /// Order not found in the book
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Cancellation attempted by a team that does not own the order
    #[error("order {order_id} is not owned by team {team_id}")]
    NotOwner {
        /// The order that was targeted
        order_id: OrderId,
        /// The team that attempted the cancel
        team_id: String,
    },

    /// Order has zero quantity
    #[error("order {0} has zero quantity")]
    ZeroQuantity(OrderId),

    /// Market orders carry no price and can never rest in the book
    #[error("market order {0} cannot rest in the book")]
    MarketOrderCannotRest(OrderId),

    /// Order book for a different symbol received this order
    #[error("order {order_id} for {order_symbol} sent to book {book_symbol}")]
    SymbolMismatch {
        /// The order that was misrouted
        order_id: OrderId,
        /// Symbol on the order
        order_symbol: String,
        /// Symbol of the receiving book
        book_symbol: String,
    },
}
