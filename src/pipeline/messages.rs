//! Typed messages carried by the pipeline queues.
//!
//! Every queue has a shutdown sentinel variant; workers drain to the
//! sentinel, forward it downstream, and exit.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::correlator::Liquidity;
use crate::orderbook::{AuctionResult, MatchResult, Order, OrderBookError, OrderId, Side, Trade};
use crate::phase::PhaseState;
use crate::teams::{Role, TeamId};

/// Ingress queue: what HTTP handlers feed the validator.
#[derive(Debug)]
pub enum IngressMessage {
    /// A new order, already carrying its server-assigned id
    Submit {
        /// The order as accepted at ingress
        order: Order,
        /// Role of the submitting team (resolves the constraint set)
        role: Role,
        /// Pending-request id to resolve, when a REST caller is parked
        request_id: Option<Uuid>,
    },
    /// A cancellation request
    Cancel {
        /// Order to cancel
        order_id: OrderId,
        /// Requesting team; only the owner may cancel
        team_id: TeamId,
        /// Pending-request id to resolve
        request_id: Option<Uuid>,
    },
    /// Drain-and-exit sentinel
    Shutdown,
}

/// Match queue: validated work for the matcher.
#[derive(Debug)]
pub enum MatchCommand {
    /// Insert an accepted order
    Submit {
        /// The validated order
        order: Order,
        /// Pending-request id to resolve
        request_id: Option<Uuid>,
    },
    /// Cancel a resting order
    Cancel {
        /// Order to cancel
        order_id: OrderId,
        /// Requesting team
        team_id: TeamId,
        /// Pending-request id to resolve
        request_id: Option<Uuid>,
    },
    /// Drain-and-exit sentinel
    Shutdown,
}

/// Trade queue: matcher outcomes for the publisher.
#[derive(Debug)]
pub enum MatchOutcome {
    /// An order went through the book (possibly trading, possibly resting)
    Executed {
        /// Trades, filled ids, and the incoming order's final state
        result: MatchResult,
        /// Pending-request id to resolve
        request_id: Option<Uuid>,
    },
    /// Matching is disabled; the order is held for later release
    Buffered {
        /// The held order
        order: Order,
        /// Pending-request id to resolve
        request_id: Option<Uuid>,
    },
    /// A cancellation succeeded
    CancelDone {
        /// The cancelled order
        order: Order,
        /// Pending-request id to resolve
        request_id: Option<Uuid>,
    },
    /// A cancellation failed
    CancelFailed {
        /// The order targeted
        order_id: OrderId,
        /// The requesting team
        team_id: TeamId,
        /// Why the cancel failed
        reason: OrderBookError,
        /// Pending-request id to resolve
        request_id: Option<Uuid>,
    },
    /// The opening auction cleared a book
    AuctionCleared {
        /// The cleared instrument
        symbol: String,
        /// Clearing price and trades
        result: AuctionResult,
    },
    /// Drain-and-exit sentinel
    Shutdown,
}

/// Position queue: trades for the position tracker.
#[derive(Debug)]
pub enum PositionCommand {
    /// Apply one trade's deltas
    Apply {
        /// The executed trade
        trade: Trade,
    },
    /// Drain-and-exit sentinel
    Shutdown,
}

/// Addressing for fan-out delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanoutTarget {
    /// One team's socket
    Team(TeamId),
    /// Every connected socket
    Broadcast,
}

/// Fan-out queue entries.
#[derive(Debug)]
pub enum FanoutCommand {
    /// Route one event
    Deliver {
        /// Who receives it
        target: FanoutTarget,
        /// What they receive
        event: OutboundEvent,
    },
    /// Drain-and-exit sentinel
    Shutdown,
}

impl FanoutCommand {
    /// Event addressed to a single team.
    pub fn to_team(team_id: impl Into<TeamId>, event: OutboundEvent) -> Self {
        FanoutCommand::Deliver {
            target: FanoutTarget::Team(team_id.into()),
            event,
        }
    }

    /// Event addressed to every connected team.
    pub fn broadcast(event: OutboundEvent) -> Self {
        FanoutCommand::Deliver {
            target: FanoutTarget::Broadcast,
            event,
        }
    }
}

/// `order_ack` payload.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAckData {
    /// Server-assigned order id
    pub order_id: OrderId,
    /// Echo of the client's id
    pub client_order_id: Option<String>,
    /// Status at acknowledgement
    pub status: crate::orderbook::OrderStatus,
}

/// `order_reject` payload.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRejectData {
    /// Echo of the client's id
    pub client_order_id: Option<String>,
    /// Stable rejection code
    pub reject_code: String,
    /// Human-readable reason
    pub reject_reason: String,
}

/// `execution_report` payload, one per fill per side.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReportData {
    /// This side's order
    pub order_id: OrderId,
    /// This side's client order id
    pub client_order_id: Option<String>,
    /// This side of the trade
    pub side: Side,
    /// Executed quantity
    pub quantity: u64,
    /// Execution price in dollars
    pub price: f64,
    /// Maker or taker for this side
    pub liquidity: Liquidity,
    /// Signed fee in dollars (positive = credit)
    pub fee: f64,
    /// The trade id
    pub trade_id: Uuid,
    /// Team on the other side
    pub counterparty: TeamId,
    /// Trade wall-clock timestamp (millis)
    pub timestamp: u64,
}

/// `cancel_ack` / `cancel_reject` payload.
#[derive(Debug, Clone, Serialize)]
pub struct CancelData {
    /// The order targeted
    pub order_id: OrderId,
    /// Failure reason, absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `position_snapshot` payload.
#[derive(Debug, Clone, Serialize)]
pub struct PositionSnapshotData {
    /// Net position per instrument
    pub positions: HashMap<String, i64>,
}

/// `phase_change` payload.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseChangeData {
    /// New phase name
    pub phase_name: String,
    /// Whether submissions are accepted
    pub submit_allowed: bool,
    /// Whether cancellations are accepted
    pub cancel_allowed: bool,
    /// Whether matching runs
    pub match_enabled: bool,
    /// Execution style of the new phase
    pub execution_style: crate::phase::ExecutionStyle,
}

impl From<PhaseState> for PhaseChangeData {
    fn from(state: PhaseState) -> Self {
        Self {
            phase_name: state.phase.to_string(),
            submit_allowed: state.submit_allowed,
            cancel_allowed: state.cancel_allowed,
            match_enabled: state.match_enabled,
            execution_style: state.execution_style,
        }
    }
}

/// A typed outbound message, before the per-connection envelope is added.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
    /// Order accepted
    OrderAck(OrderAckData),
    /// Order refused
    OrderReject(OrderRejectData),
    /// One fill on one side
    ExecutionReport(ExecutionReportData),
    /// Cancel succeeded
    CancelAck(CancelData),
    /// Cancel failed
    CancelReject(CancelData),
    /// Updated positions for the addressed team
    PositionSnapshot(PositionSnapshotData),
    /// Market phase changed
    PhaseChange(PhaseChangeData),
}

impl OutboundEvent {
    /// Wire name of this message type.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            OutboundEvent::OrderAck(_) => "order_ack",
            OutboundEvent::OrderReject(_) => "order_reject",
            OutboundEvent::ExecutionReport(_) => "execution_report",
            OutboundEvent::CancelAck(_) => "cancel_ack",
            OutboundEvent::CancelReject(_) => "cancel_reject",
            OutboundEvent::PositionSnapshot(_) => "position_snapshot",
            OutboundEvent::PhaseChange(_) => "phase_change",
        }
    }

    /// The `data` field of the envelope.
    pub fn to_data(&self) -> Value {
        let result = match self {
            OutboundEvent::OrderAck(d) => serde_json::to_value(d),
            OutboundEvent::OrderReject(d) => serde_json::to_value(d),
            OutboundEvent::ExecutionReport(d) => serde_json::to_value(d),
            OutboundEvent::CancelAck(d) => serde_json::to_value(d),
            OutboundEvent::CancelReject(d) => serde_json::to_value(d),
            OutboundEvent::PositionSnapshot(d) => serde_json::to_value(d),
            OutboundEvent::PhaseChange(d) => serde_json::to_value(d),
        };
        result.unwrap_or(Value::Null)
    }
}

/// Convert an internal cent amount to wire dollars.
#[must_use]
pub fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Convert a wire dollar price to cents, enforcing the $0.01 tick.
///
/// Returns `None` for non-positive, non-finite, or off-tick prices.
#[must_use]
pub fn dollars_to_cents(dollars: f64) -> Option<u64> {
    if !dollars.is_finite() || dollars <= 0.0 {
        return None;
    }
    let cents = (dollars * 100.0).round();
    if (dollars * 100.0 - cents).abs() > 1e-6 {
        return None;
    }
    Some(cents as u64)
}
