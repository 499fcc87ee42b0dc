//! End-to-end pipeline scenarios: ingress through validation, matching,
//! publication, positions, and fan-out.

use super::common::{always_closed, count_of, drain_events, eventually, TestExchange};
use optex_rs::orderbook::{OrderId, OrderStatus, Side};
use optex_rs::phase::{Phase, PhaseSchedule};
use optex_rs::pipeline::messages::OutboundEvent;
use optex_rs::correlator::Liquidity;
use optex_rs::teams::Role;

#[tokio::test]
async fn test_resting_then_crossing_with_fees_and_positions() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;

    let maker = exchange.teams.register("mm", Role::MarketMaker);
    let taker = exchange.teams.register("hf", Role::HedgeFund);
    let mut maker_events = exchange.listen(&maker);
    let mut taker_events = exchange.listen(&taker);

    let resting = exchange.submit(&maker, Side::Buy, 10, Some(525)).await;
    assert_eq!(resting.status, OrderStatus::New);
    assert!(resting.fills.is_empty());

    let crossing = exchange
        .submit_with_client_id(&taker, Side::Sell, 5, Some(525), Some("hf-1".to_string()))
        .await;
    assert_eq!(crossing.client_order_id.as_deref(), Some("hf-1"));
    assert_eq!(crossing.status, OrderStatus::Filled);
    assert_eq!(crossing.fills.len(), 1);
    let fill = &crossing.fills[0];
    assert_eq!(fill.price, 5.25);
    assert_eq!(fill.quantity, 5);
    assert_eq!(fill.liquidity, Liquidity::Taker);
    // Hedge fund taker: -$0.02 x 5.
    assert_eq!(fill.fee, -0.10);
    assert_eq!(fill.counterparty, maker.team_id);

    eventually(
        || exchange.pipeline.positions.net(&maker.team_id, "TEST") == 5,
        "maker position reaches +5",
    )
    .await;
    assert_eq!(exchange.pipeline.positions.net(&taker.team_id, "TEST"), -5);
    assert_eq!(exchange.pipeline.positions.instrument_sum("TEST"), 0);

    let maker_seen = drain_events(&mut maker_events).await;
    assert_eq!(count_of(&maker_seen, "order_ack"), 1);
    assert_eq!(count_of(&maker_seen, "execution_report"), 1);
    assert_eq!(count_of(&maker_seen, "position_snapshot"), 1);
    // The maker side of the trade earns +$0.02 x 5.
    let report = maker_seen
        .iter()
        .find_map(|e| match e {
            OutboundEvent::ExecutionReport(report) => Some(report),
            _ => None,
        })
        .expect("maker execution report");
    assert_eq!(report.fee, 0.10);
    assert_eq!(report.liquidity, Liquidity::Maker);
    assert_eq!(report.counterparty, taker.team_id);

    let taker_seen = drain_events(&mut taker_events).await;
    assert_eq!(count_of(&taker_seen, "order_ack"), 1);
    assert_eq!(count_of(&taker_seen, "order_reject"), 0);
    assert_eq!(count_of(&taker_seen, "execution_report"), 1);

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_market_closed_rejects_before_constraints() {
    let exchange = TestExchange::start(always_closed());
    exchange.wait_for_phase(Phase::Closed).await;
    let team = exchange.teams.register("mm", Role::MarketMaker);
    let mut events = exchange.listen(&team);

    let reply = exchange.submit(&team, Side::Buy, 10, Some(525)).await;
    assert_eq!(reply.status, OrderStatus::Rejected);
    assert_eq!(reply.reject_code.as_deref(), Some("MARKET_CLOSED"));
    assert!(reply.fills.is_empty());

    let seen = drain_events(&mut events).await;
    assert_eq!(count_of(&seen, "order_reject"), 1);
    assert_eq!(count_of(&seen, "order_ack"), 0);

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_position_limit_reject_keeps_book_clean() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;
    let mm = exchange.teams.register("mm", Role::MarketMaker);
    let other = exchange.teams.register("hf", Role::HedgeFund);
    let mut events = exchange.listen(&mm);

    // Walk the market maker to +48 through real trades.
    let resting = exchange.submit(&other, Side::Sell, 48, Some(525)).await;
    assert_eq!(resting.status, OrderStatus::New);
    let fill = exchange.submit(&mm, Side::Buy, 48, Some(525)).await;
    assert_eq!(fill.status, OrderStatus::Filled);
    eventually(
        || exchange.pipeline.positions.net(&mm.team_id, "TEST") == 48,
        "mm position reaches +48",
    )
    .await;

    // Buying 5 more would breach the symmetric limit of 50.
    let reply = exchange.submit(&mm, Side::Buy, 5, Some(525)).await;
    assert_eq!(reply.status, OrderStatus::Rejected);
    assert_eq!(reply.reject_code.as_deref(), Some("MM_POS_LIMIT"));

    let seen = drain_events(&mut events).await;
    assert_eq!(count_of(&seen, "order_reject"), 1);

    // The rejected order never reached the book: selling 5 meets no bid
    // at that price from the rejected order.
    let probe = exchange.submit(&other, Side::Sell, 5, Some(525)).await;
    assert_eq!(probe.status, OrderStatus::New);
    assert!(probe.fills.is_empty());

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_price_time_priority_across_teams() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;
    let t1 = exchange.teams.register("t1", Role::HedgeFund);
    let t2 = exchange.teams.register("t2", Role::HedgeFund);
    let t3 = exchange.teams.register("t3", Role::HedgeFund);
    let seller = exchange.teams.register("s", Role::HedgeFund);

    let o1 = exchange.submit(&t1, Side::Buy, 50, Some(2545)).await;
    exchange.submit(&t2, Side::Buy, 30, Some(2545)).await;
    exchange.submit(&t3, Side::Buy, 100, Some(2540)).await;

    let reply = exchange.submit(&seller, Side::Sell, 60, Some(2540)).await;
    assert_eq!(reply.status, OrderStatus::Filled);
    assert_eq!(reply.fills.len(), 2);
    assert_eq!(reply.fills[0].quantity, 50);
    assert_eq!(reply.fills[0].counterparty, t1.team_id);
    assert_eq!(reply.fills[0].price, 25.45);
    assert_eq!(reply.fills[1].quantity, 10);
    assert_eq!(reply.fills[1].counterparty, t2.team_id);

    eventually(
        || exchange.pipeline.positions.net(&t3.team_id, "TEST") == 0,
        "t3 untouched",
    )
    .await;
    assert_eq!(exchange.pipeline.positions.net(&t1.team_id, "TEST"), 50);
    assert_eq!(exchange.pipeline.positions.net(&t2.team_id, "TEST"), 10);
    // o1 fully filled before t2 saw anything.
    assert_eq!(o1.status, OrderStatus::New);

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_market_order_on_empty_book_is_cancelled() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;
    let team = exchange.teams.register("hf", Role::HedgeFund);

    let reply = exchange.submit(&team, Side::Buy, 10, None).await;
    assert_eq!(reply.status, OrderStatus::Cancelled);
    assert!(reply.fills.is_empty());

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_idempotent_cancel() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;
    let team = exchange.teams.register("hf", Role::HedgeFund);
    let mut events = exchange.listen(&team);

    let placed = exchange.submit(&team, Side::Buy, 10, Some(525)).await;
    let first = exchange.cancel(&team, placed.order_id).await;
    assert!(first.cancelled);
    assert_eq!(first.reason, None);

    let second = exchange.cancel(&team, placed.order_id).await;
    assert!(!second.cancelled);
    assert!(second.reason.is_some());

    let seen = drain_events(&mut events).await;
    assert_eq!(count_of(&seen, "cancel_ack"), 1);
    assert_eq!(count_of(&seen, "cancel_reject"), 1);

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_foreign_team_cannot_cancel() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;
    let owner = exchange.teams.register("owner", Role::HedgeFund);
    let thief = exchange.teams.register("thief", Role::HedgeFund);

    let placed = exchange.submit(&owner, Side::Buy, 10, Some(525)).await;
    let attempt = exchange.cancel(&thief, placed.order_id).await;
    assert!(!attempt.cancelled);

    // The order still rests and the owner can still cancel it.
    let own = exchange.cancel(&owner, placed.order_id).await;
    assert!(own.cancelled);

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_cancel_of_filled_order_reports_not_found() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;
    let maker = exchange.teams.register("m", Role::HedgeFund);
    let taker = exchange.teams.register("t", Role::HedgeFund);

    let placed = exchange.submit(&maker, Side::Buy, 5, Some(525)).await;
    let crossing = exchange.submit(&taker, Side::Sell, 5, Some(525)).await;
    assert_eq!(crossing.status, OrderStatus::Filled);

    let attempt = exchange.cancel(&maker, placed.order_id).await;
    assert!(!attempt.cancelled);

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_self_trade_charges_both_sides() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;
    let team = exchange.teams.register("mm", Role::MarketMaker);
    let mut events = exchange.listen(&team);

    exchange.submit(&team, Side::Buy, 5, Some(525)).await;
    let crossing = exchange.submit(&team, Side::Sell, 5, Some(525)).await;
    assert_eq!(crossing.status, OrderStatus::Filled);

    eventually(
        || exchange.pipeline.positions.net(&team.team_id, "TEST") == 0,
        "self-trade nets flat",
    )
    .await;

    // Both sides report: one maker (+0.02 x 5), one taker (-0.01 x 5).
    let seen = drain_events(&mut events).await;
    let fees: Vec<f64> = seen
        .iter()
        .filter_map(|e| match e {
            OutboundEvent::ExecutionReport(report) => Some(report.fee),
            _ => None,
        })
        .collect();
    assert_eq!(fees.len(), 2);
    assert!(fees.contains(&0.10));
    assert!(fees.contains(&-0.05));

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_timeout_when_pipeline_stalls() {
    use optex_rs::correlator::{CorrelationError, ResponseCoordinator};
    use std::time::Duration;

    // A coordinator with a short deadline and no pipeline behind it
    // behaves exactly like a stalled matcher: nothing ever resolves.
    let correlator = ResponseCoordinator::new(Duration::from_millis(100), 10);
    let (request_id, rx) = correlator.register().unwrap();
    let started = std::time::Instant::now();
    let err = correlator.wait(request_id, rx).await.unwrap_err();
    assert!(matches!(err, CorrelationError::Timeout(id) if id == request_id));
    assert!(started.elapsed() >= Duration::from_millis(100));

    // The late outcome from the recovered pipeline is discarded.
    correlator.resolve(
        request_id,
        optex_rs::correlator::PipelineReply::Cancel(optex_rs::correlator::CancelReply {
            order_id: OrderId(1),
            cancelled: true,
            reason: None,
        }),
    );
    assert_eq!(correlator.pending_count(), 0);
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;
    // Retail allows 10 orders per rolling second.
    let team = exchange.teams.register("r", Role::Retail);

    let mut rejected = 0;
    for i in 0..12u64 {
        let reply = exchange
            .submit(&team, Side::Buy, 1, Some(100 + i))
            .await;
        if reply.reject_code.as_deref() == Some("RETAIL_RATE_LIMIT") {
            rejected += 1;
        }
    }
    assert_eq!(rejected, 2);

    exchange.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_reports_stages_down() {
    let exchange = TestExchange::start(PhaseSchedule::always_open());
    exchange.wait_for_phase(Phase::Continuous).await;
    assert!(exchange.pipeline.stage_health().iter().all(|s| s.alive));

    exchange.shutdown().await;
    assert!(exchange.pipeline.stage_health().is_empty());
}
