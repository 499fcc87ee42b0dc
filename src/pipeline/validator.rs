//! Validator stage: role constraints, phase gating, and rate limiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::matcher::MidPriceCache;
use super::messages::{
    FanoutCommand, IngressMessage, MatchCommand, OrderAckData, OrderRejectData, OutboundEvent,
};
use super::positions::PositionStore;
use crate::correlator::{CancelReply, OrderReply, PipelineReply, ResponseCoordinator};
use crate::instruments::InstrumentRegistry;
use crate::orderbook::{Order, OrderStatus};
use crate::phase::PhaseState;
use crate::teams::{Role, TeamId};
use crate::validation::{ConstraintSet, RateWindow, Rejection, ValidationContext};
use crate::utils::monotonic_nanos;

/// Window length for the rolling order-rate counters.
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Everything the validator stage needs at startup.
pub struct ValidatorDeps {
    /// Forward queue to the matcher
    pub match_tx: mpsc::Sender<MatchCommand>,
    /// Fan-out queue for acks and rejects
    pub fanout_tx: mpsc::Sender<FanoutCommand>,
    /// Pending-request table for reject resolutions
    pub correlator: Arc<ResponseCoordinator>,
    /// Per-role constraint sets, immutable after config load
    pub constraints: Arc<HashMap<Role, ConstraintSet>>,
    /// Listed instruments
    pub instruments: Arc<InstrumentRegistry>,
    /// Positions read for limit checks
    pub positions: Arc<PositionStore>,
    /// Mid prices published by the matcher
    pub mids: Arc<MidPriceCache>,
    /// Phase cell written by the phase manager
    pub phase_rx: watch::Receiver<PhaseState>,
}

/// Validator stage: single consumer of the ingress queue and single
/// writer of the rate counters and the match queue.
///
/// The phase gate runs before any constraint; accepted orders get their
/// `submitted_at` stamp here, which fixes their time priority at the book
/// regardless of downstream queueing jitter.
pub async fn run_validator(mut rx: mpsc::Receiver<IngressMessage>, deps: ValidatorDeps) {
    info!("validator started");
    let mut rate_windows: HashMap<TeamId, RateWindow> = HashMap::new();

    while let Some(message) = rx.recv().await {
        match message {
            IngressMessage::Submit {
                mut order,
                role,
                request_id,
            } => {
                order.submitted_at = monotonic_nanos();
                let phase = *deps.phase_rx.borrow();

                let verdict = validate(&order, role, phase, &mut rate_windows, &deps);
                match verdict {
                    Ok(()) => {
                        let ack = OutboundEvent::OrderAck(OrderAckData {
                            order_id: order.id,
                            client_order_id: order.client_order_id.clone(),
                            status: order.status,
                        });
                        if deps
                            .fanout_tx
                            .send(FanoutCommand::to_team(order.team_id.clone(), ack))
                            .await
                            .is_err()
                        {
                            warn!("fan-out queue closed; dropping ack for {}", order.id);
                        }
                        if deps
                            .match_tx
                            .send(MatchCommand::Submit { order, request_id })
                            .await
                            .is_err()
                        {
                            warn!("match queue closed; validator exiting");
                            break;
                        }
                    }
                    Err(rejection) => {
                        debug!(
                            "rejected order {} from {}: {}",
                            order.id, order.team_id, rejection.code
                        );
                        reject_order(&deps, order, rejection, request_id).await;
                    }
                }
            }
            IngressMessage::Cancel {
                order_id,
                team_id,
                request_id,
            } => {
                let phase = *deps.phase_rx.borrow();
                if !phase.cancel_allowed {
                    reject_cancel(&deps, order_id, team_id, request_id).await;
                    continue;
                }
                if deps
                    .match_tx
                    .send(MatchCommand::Cancel {
                        order_id,
                        team_id,
                        request_id,
                    })
                    .await
                    .is_err()
                {
                    warn!("match queue closed; validator exiting");
                    break;
                }
            }
            IngressMessage::Shutdown => break,
        }
    }

    let _ = deps.match_tx.send(MatchCommand::Shutdown).await;
    info!("validator stopped");
}

fn validate(
    order: &Order,
    role: Role,
    phase: PhaseState,
    rate_windows: &mut HashMap<TeamId, RateWindow>,
    deps: &ValidatorDeps,
) -> Result<(), Rejection> {
    if !phase.submit_allowed {
        return Err(Rejection::new(
            "MARKET_CLOSED",
            format!("market is {}; submissions are not accepted", phase.phase),
        ));
    }
    if !deps.instruments.contains(&order.symbol) {
        return Err(Rejection::new(
            "INVALID_INSTRUMENT",
            format!("unknown instrument {}", order.symbol),
        ));
    }

    // Rejected orders still consume rate budget: the request was made.
    let recent_order_count = rate_windows
        .entry(order.team_id.clone())
        .or_default()
        .record_and_count(Instant::now(), RATE_WINDOW);

    let ctx = ValidationContext {
        position: deps.positions.net(&order.team_id, &order.symbol),
        portfolio_abs_total: deps.positions.portfolio_abs(&order.team_id),
        recent_order_count,
        mid_price: deps.mids.get(&order.symbol),
    };

    deps.constraints
        .get(&role)
        .map(|set| set.check(order, &ctx))
        .unwrap_or(Ok(()))
}

async fn reject_order(
    deps: &ValidatorDeps,
    mut order: Order,
    rejection: Rejection,
    request_id: Option<Uuid>,
) {
    order.status = OrderStatus::Rejected;
    let event = OutboundEvent::OrderReject(OrderRejectData {
        client_order_id: order.client_order_id.clone(),
        reject_code: rejection.code.clone(),
        reject_reason: rejection.message.clone(),
    });
    let _ = deps
        .fanout_tx
        .send(FanoutCommand::to_team(order.team_id.clone(), event))
        .await;
    if let Some(request_id) = request_id {
        deps.correlator.resolve(
            request_id,
            PipelineReply::Order(OrderReply {
                order_id: order.id,
                client_order_id: order.client_order_id,
                status: OrderStatus::Rejected,
                fills: Vec::new(),
                reject_code: Some(rejection.code),
                reject_reason: Some(rejection.message),
            }),
        );
    }
}

async fn reject_cancel(
    deps: &ValidatorDeps,
    order_id: crate::orderbook::OrderId,
    team_id: TeamId,
    request_id: Option<Uuid>,
) {
    let event = OutboundEvent::CancelReject(super::messages::CancelData {
        order_id,
        reason: Some("MARKET_CLOSED".to_string()),
    });
    let _ = deps
        .fanout_tx
        .send(FanoutCommand::to_team(team_id, event))
        .await;
    if let Some(request_id) = request_id {
        deps.correlator.resolve(
            request_id,
            PipelineReply::Cancel(CancelReply {
                order_id,
                cancelled: false,
                reason: Some("MARKET_CLOSED".to_string()),
            }),
        );
    }
}
