//! # Simulated Options Exchange Core
//!
//! An in-memory options exchange built as a staged asynchronous pipeline:
//! authenticated trading bots submit orders over REST, a constraint-based
//! validator applies role-specific limits, a price-time priority matching
//! engine crosses them on per-instrument books, and acknowledgements,
//! execution reports, and position snapshots stream back to clients over
//! WebSockets in real time.
//!
//! ## Architecture
//!
//! Each stage is a single long-lived task consuming one bounded FIFO
//! queue and producing to the next:
//!
//! ```text
//! HTTP handlers -> [order queue] -> validator -> [match queue] -> matcher
//!     -> [trade queue] -> publisher -> [position queue] -> tracker
//!     -> [fan-out queue] -> fan-out -> WebSocket writers
//! ```
//!
//! Stages share no mutable state except the explicit stores: the
//! positions map and pending-request table behind coarse locks, and the
//! read-mostly team/instrument registries. The matcher exclusively owns
//! every order book, which makes per-instrument ordering deterministic
//! without any book-level locking.
//!
//! Synchronous REST semantics come from the request/response correlator:
//! a submission parks its HTTP handler on a completion signal that
//! whichever stage reaches a terminal outcome resolves, with a deadline
//! and a hard cap on pending requests.
//!
//! A phase manager polls the wall clock against a weekly schedule and
//! gates submission, cancellation, and matching. While matching is
//! disabled, orders buffer; the transition out of a batch phase clears
//! the books through a single opening auction at the volume-maximising
//! price.
//!
//! ## Key invariants
//!
//! - No book is ever crossed at rest: `best_bid < best_ask` after every
//!   operation.
//! - Positions sum to zero per instrument across all teams.
//! - Orders at the same price fill strictly in `submitted_at` order, and
//!   partial fills never cost a resting order its place in the queue.
//! - Market orders never rest: unfillable quantity is cancelled.
//!
//! ## Example
//!
//! ```
//! use optex_rs::orderbook::{Order, OrderBook, OrderId, Side};
//!
//! let mut book = OrderBook::new("TEST");
//! let resting = Order::new(
//!     OrderId(1), None, "maker".to_string(), "TEST",
//!     Side::Buy, 10, Some(525), 1,
//! );
//! book.insert(resting).unwrap();
//!
//! let incoming = Order::new(
//!     OrderId(2), None, "taker".to_string(), "TEST",
//!     Side::Sell, 5, Some(525), 2,
//! );
//! let result = book.insert(incoming).unwrap();
//! assert_eq!(result.trades.len(), 1);
//! assert_eq!(result.trades[0].price, 525);
//! assert_eq!(result.trades[0].quantity, 5);
//! ```

pub mod config;
pub mod correlator;
pub mod fees;
pub mod instruments;
pub mod orderbook;
pub mod phase;
pub mod pipeline;
pub mod prelude;
pub mod server;
pub mod teams;
pub mod validation;
mod utils;

pub use config::{ConfigError, ExchangeConfig};
pub use correlator::{
    CancelReply, CorrelationError, FillInfo, Liquidity, OrderReply, PipelineReply,
    ResponseCoordinator,
};
pub use fees::FeeSchedule;
pub use instruments::{Instrument, InstrumentRegistry, OptionType};
pub use orderbook::{
    AuctionResult, MatchResult, Order, OrderBook, OrderBookError, OrderId, OrderIdGenerator,
    OrderStatus, Side, Trade,
};
pub use phase::{ExecutionStyle, Phase, PhaseSchedule, PhaseState, PhaseWindow};
pub use pipeline::{Pipeline, PipelineSettings, PositionStore};
pub use server::{router, AppState};
pub use teams::{Role, Team, TeamId, TeamRegistry};
pub use utils::current_time_millis;
pub use validation::{ConstraintKind, ConstraintRule, ConstraintSet, Rejection, ValidationContext};
