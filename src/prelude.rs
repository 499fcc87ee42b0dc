//! Convenient re-exports for exchange consumers.
//!
//! ```
//! use optex_rs::prelude::*;
//!
//! let mut book = OrderBook::new("TEST");
//! assert_eq!(book.best_bid(), None);
//! ```

pub use crate::config::{ConfigError, ExchangeConfig};
pub use crate::correlator::{
    CancelReply, CorrelationError, FillInfo, Liquidity, OrderReply, PipelineReply,
    ResponseCoordinator,
};
pub use crate::fees::FeeSchedule;
pub use crate::instruments::{Instrument, InstrumentRegistry, OptionType};
pub use crate::orderbook::{
    AuctionResult, DepthLevel, DepthSnapshot, MatchResult, Order, OrderBook, OrderBookError,
    OrderId, OrderIdGenerator, OrderStatus, Side, Trade,
};
pub use crate::phase::{ExecutionStyle, Phase, PhaseSchedule, PhaseState, PhaseWindow};
pub use crate::pipeline::messages::{
    FanoutCommand, FanoutTarget, IngressMessage, MatchCommand, MatchOutcome, OutboundEvent,
    PositionCommand,
};
pub use crate::pipeline::{
    ConnectionMap, MidPriceCache, Pipeline, PipelineSettings, PositionStore, StageStatus,
};
pub use crate::server::{router, ApiError, AppState};
pub use crate::teams::{Role, Team, TeamId, TeamRegistry};
pub use crate::validation::{
    ConstraintKind, ConstraintRule, ConstraintSet, OrderTypeKind, RateWindow, Rejection,
    ValidationContext,
};
