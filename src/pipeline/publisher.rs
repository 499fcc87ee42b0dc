//! Publisher stage: fee calculation, execution reports, and request
//! resolution.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::messages::{
    cents_to_dollars, CancelData, ExecutionReportData, FanoutCommand, MatchOutcome, OutboundEvent,
    PositionCommand,
};
use crate::correlator::{CancelReply, FillInfo, Liquidity, OrderReply, PipelineReply, ResponseCoordinator};
use crate::fees::FeeSchedule;
use crate::orderbook::{MatchResult, Order, OrderStatus, Side, Trade};
use crate::teams::TeamRegistry;

/// Everything the publisher stage needs at startup.
pub struct PublisherDeps {
    /// Downstream queue to the position tracker
    pub position_tx: mpsc::Sender<PositionCommand>,
    /// Fan-out queue for reports and cancel outcomes
    pub fanout_tx: mpsc::Sender<FanoutCommand>,
    /// Pending-request table
    pub correlator: Arc<ResponseCoordinator>,
    /// Team registry (resolves fee schedules by role)
    pub teams: Arc<TeamRegistry>,
}

/// Publisher stage: drains matcher outcomes.
///
/// For every trade it computes both sides' fees from the role fee
/// schedules using the aggressor side for maker/taker attribution, emits
/// one execution report per side, and hands the trade to the position
/// tracker. Terminal outcomes resolve the parked REST caller.
pub async fn run_publisher(mut rx: mpsc::Receiver<MatchOutcome>, deps: PublisherDeps) {
    info!("publisher started");
    while let Some(outcome) = rx.recv().await {
        match outcome {
            MatchOutcome::Executed { result, request_id } => {
                publish_trades(&deps, &result.trades).await;
                if let Some(request_id) = request_id {
                    let reply = order_reply(&deps, &result.order, &result);
                    deps.correlator.resolve(request_id, PipelineReply::Order(reply));
                }
            }
            MatchOutcome::Buffered { order, request_id } => {
                if let Some(request_id) = request_id {
                    deps.correlator.resolve(
                        request_id,
                        PipelineReply::Order(OrderReply {
                            order_id: order.id,
                            client_order_id: order.client_order_id,
                            status: order.status,
                            fills: Vec::new(),
                            reject_code: None,
                            reject_reason: None,
                        }),
                    );
                }
            }
            MatchOutcome::CancelDone { order, request_id } => {
                let ack = OutboundEvent::CancelAck(CancelData {
                    order_id: order.id,
                    reason: None,
                });
                let _ = deps
                    .fanout_tx
                    .send(FanoutCommand::to_team(order.team_id.clone(), ack))
                    .await;
                if let Some(request_id) = request_id {
                    deps.correlator.resolve(
                        request_id,
                        PipelineReply::Cancel(CancelReply {
                            order_id: order.id,
                            cancelled: true,
                            reason: None,
                        }),
                    );
                }
            }
            MatchOutcome::CancelFailed {
                order_id,
                team_id,
                reason,
                request_id,
            } => {
                let reason_text = reason.to_string();
                let reject = OutboundEvent::CancelReject(CancelData {
                    order_id,
                    reason: Some(reason_text.clone()),
                });
                let _ = deps
                    .fanout_tx
                    .send(FanoutCommand::to_team(team_id, reject))
                    .await;
                if let Some(request_id) = request_id {
                    deps.correlator.resolve(
                        request_id,
                        PipelineReply::Cancel(CancelReply {
                            order_id,
                            cancelled: false,
                            reason: Some(reason_text),
                        }),
                    );
                }
            }
            MatchOutcome::AuctionCleared { symbol, result } => {
                info!(
                    "publishing {} auction trades on {} at {}",
                    result.trades.len(),
                    symbol,
                    result.clearing_price
                );
                publish_trades(&deps, &result.trades).await;
            }
            MatchOutcome::Shutdown => break,
        }
    }
    let _ = deps.position_tx.send(PositionCommand::Shutdown).await;
    info!("publisher stopped");
}

/// Emit execution reports for both sides of each trade and queue the
/// position deltas.
async fn publish_trades(deps: &PublisherDeps, trades: &[Trade]) {
    for trade in trades {
        for side in [Side::Buy, Side::Sell] {
            let team_id = trade.team_on(side).clone();
            let liquidity = Liquidity::for_side(side, trade.aggressor_side);
            let fee_cents = fee_for(deps, &team_id, trade.quantity, liquidity);
            let report = OutboundEvent::ExecutionReport(ExecutionReportData {
                order_id: trade.order_on(side),
                client_order_id: trade.client_id_on(side).cloned(),
                side,
                quantity: trade.quantity,
                price: cents_to_dollars(trade.price as i64),
                liquidity,
                fee: cents_to_dollars(fee_cents),
                trade_id: trade.trade_id,
                counterparty: trade.team_on(side.opposite()).clone(),
                timestamp: trade.timestamp,
            });
            let _ = deps
                .fanout_tx
                .send(FanoutCommand::to_team(team_id, report))
                .await;
        }
        if deps
            .position_tx
            .send(PositionCommand::Apply {
                trade: trade.clone(),
            })
            .await
            .is_err()
        {
            warn!("position queue closed; dropping trade {}", trade.trade_id);
        }
    }
}

/// Build the REST submission reply for the incoming order's side of its
/// trades.
fn order_reply(deps: &PublisherDeps, order: &Order, result: &MatchResult) -> OrderReply {
    let fills = result
        .trades
        .iter()
        .map(|trade| {
            let liquidity = Liquidity::for_side(order.side, trade.aggressor_side);
            let fee_cents = fee_for(deps, &order.team_id, trade.quantity, liquidity);
            FillInfo {
                trade_id: trade.trade_id,
                price: cents_to_dollars(trade.price as i64),
                quantity: trade.quantity,
                liquidity,
                fee: cents_to_dollars(fee_cents),
                counterparty: trade.team_on(order.side.opposite()).clone(),
            }
        })
        .collect();
    let reject_code = (order.status == OrderStatus::Rejected).then(|| "INTERNAL".to_string());
    OrderReply {
        order_id: order.id,
        client_order_id: order.client_order_id.clone(),
        status: order.status,
        fills,
        reject_code: reject_code.clone(),
        reject_reason: reject_code.map(|_| "order could not be processed".to_string()),
    }
}

fn fee_for(deps: &PublisherDeps, team_id: &str, quantity: u64, liquidity: Liquidity) -> i64 {
    let schedule = deps
        .teams
        .get(team_id)
        .map(|team| team.role.fee_schedule())
        .unwrap_or_else(|| {
            warn!("fee lookup for unknown team {team_id}; charging zero");
            FeeSchedule::zero_fee()
        });
    schedule.calculate_fee(quantity, liquidity == Liquidity::Maker)
}
