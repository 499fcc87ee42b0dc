//! Opening-auction behaviour through the matcher stage: buffering while
//! matching is disabled, the batch cross on the auction transition, and
//! continuous release afterwards.

use std::sync::Arc;
use std::time::Duration;

use optex_rs::orderbook::{Order, OrderId, OrderStatus, Side};
use optex_rs::phase::{Phase, PhaseState};
use optex_rs::pipeline::matcher::{run_matcher, MidPriceCache};
use optex_rs::pipeline::messages::{MatchCommand, MatchOutcome};
use tokio::sync::{mpsc, watch};

struct MatcherHarness {
    match_tx: mpsc::Sender<MatchCommand>,
    trade_rx: mpsc::Receiver<MatchOutcome>,
    phase_tx: watch::Sender<PhaseState>,
    handle: tokio::task::JoinHandle<()>,
}

fn spawn_matcher(initial: PhaseState) -> MatcherHarness {
    let (match_tx, match_rx) = mpsc::channel(64);
    let (trade_tx, trade_rx) = mpsc::channel(64);
    let (phase_tx, phase_rx) = watch::channel(initial);
    let handle = tokio::spawn(run_matcher(
        match_rx,
        trade_tx,
        phase_rx,
        Arc::new(MidPriceCache::new()),
    ));
    MatcherHarness {
        match_tx,
        trade_rx,
        phase_tx,
        handle,
    }
}

fn order(id: u64, team: &str, side: Side, price: Option<u64>, quantity: u64) -> Order {
    Order::new(
        OrderId(id),
        None,
        team.to_string(),
        "TEST",
        side,
        quantity,
        price,
        id,
    )
}

async fn submit(harness: &mut MatcherHarness, o: Order) -> MatchOutcome {
    harness
        .match_tx
        .send(MatchCommand::Submit {
            order: o,
            request_id: None,
        })
        .await
        .unwrap();
    harness.trade_rx.recv().await.unwrap()
}

#[tokio::test]
async fn test_orders_buffer_while_matching_disabled() {
    let mut harness = spawn_matcher(PhaseState::for_phase(Phase::PreOpen));

    let outcome = submit(&mut harness, order(1, "t1", Side::Buy, Some(10_000), 10)).await;
    match outcome {
        MatchOutcome::Buffered { order, .. } => {
            assert_eq!(order.id, OrderId(1));
            assert_eq!(order.status, OrderStatus::New);
        }
        other => panic!("expected Buffered, got {other:?}"),
    }

    harness.match_tx.send(MatchCommand::Shutdown).await.unwrap();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_opening_auction_clears_at_midpoint() {
    // Scenario: during pre_open T1 bids 10 @ 100.00 and T2 offers
    // 10 @ 98.00; the auction clears 10 @ 99.00 on the midpoint tie-break.
    let mut harness = spawn_matcher(PhaseState::for_phase(Phase::PreOpen));

    submit(&mut harness, order(1, "t1", Side::Buy, Some(10_000), 10)).await;
    submit(&mut harness, order(2, "t2", Side::Sell, Some(9_800), 10)).await;

    harness
        .phase_tx
        .send(PhaseState::for_phase(Phase::OpeningAuction))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness
        .phase_tx
        .send(PhaseState::for_phase(Phase::Continuous))
        .unwrap();

    let outcome = harness.trade_rx.recv().await.unwrap();
    match outcome {
        MatchOutcome::AuctionCleared { symbol, result } => {
            assert_eq!(symbol, "TEST");
            assert_eq!(result.clearing_price, 9_900);
            assert_eq!(result.trades.len(), 1);
            assert_eq!(result.trades[0].quantity, 10);
            assert_eq!(result.trades[0].buyer_team_id, "t1");
            assert_eq!(result.trades[0].seller_team_id, "t2");
        }
        other => panic!("expected AuctionCleared, got {other:?}"),
    }

    harness.match_tx.send(MatchCommand::Shutdown).await.unwrap();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_unmatched_auction_quantity_rests_into_continuous() {
    let mut harness = spawn_matcher(PhaseState::for_phase(Phase::PreOpen));

    submit(&mut harness, order(1, "t1", Side::Buy, Some(10_000), 10)).await;
    submit(&mut harness, order(2, "t2", Side::Sell, Some(9_800), 4)).await;

    harness
        .phase_tx
        .send(PhaseState::for_phase(Phase::OpeningAuction))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness
        .phase_tx
        .send(PhaseState::for_phase(Phase::Continuous))
        .unwrap();

    match harness.trade_rx.recv().await.unwrap() {
        MatchOutcome::AuctionCleared { result, .. } => {
            assert_eq!(result.trades.iter().map(|t| t.quantity).sum::<u64>(), 4);
        }
        other => panic!("expected AuctionCleared, got {other:?}"),
    }

    // The residual 6 lots still rest as a bid: a new sell crosses them.
    let outcome = submit(&mut harness, order(3, "t3", Side::Sell, Some(9_900), 6)).await;
    match outcome {
        MatchOutcome::Executed { result, .. } => {
            assert_eq!(result.trades.len(), 1);
            assert_eq!(result.trades[0].quantity, 6);
            // Resting bid price wins: execution at the bid, not the offer.
            assert_eq!(result.trades[0].price, 10_000);
        }
        other => panic!("expected Executed, got {other:?}"),
    }

    harness.match_tx.send(MatchCommand::Shutdown).await.unwrap();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_buffered_market_orders_release_after_auction() {
    let mut harness = spawn_matcher(PhaseState::for_phase(Phase::PreOpen));

    submit(&mut harness, order(1, "t1", Side::Sell, Some(9_900), 10)).await;
    // A market order cannot join the auction; it releases continuously
    // once matching turns on.
    submit(&mut harness, order(2, "t2", Side::Buy, None, 4)).await;

    harness
        .phase_tx
        .send(PhaseState::for_phase(Phase::OpeningAuction))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness
        .phase_tx
        .send(PhaseState::for_phase(Phase::Continuous))
        .unwrap();

    // One-sided book: no auction outcome, straight to the release.
    let outcome = harness.trade_rx.recv().await.unwrap();
    match outcome {
        MatchOutcome::Executed { result, .. } => {
            assert_eq!(result.order.id, OrderId(2));
            assert_eq!(result.trades.len(), 1);
            assert_eq!(result.trades[0].price, 9_900);
            assert_eq!(result.trades[0].quantity, 4);
        }
        other => panic!("expected Executed, got {other:?}"),
    }

    harness.match_tx.send(MatchCommand::Shutdown).await.unwrap();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_buffered_order_can_be_cancelled() {
    let mut harness = spawn_matcher(PhaseState::for_phase(Phase::PreOpen));

    submit(&mut harness, order(1, "t1", Side::Buy, Some(10_000), 10)).await;

    harness
        .match_tx
        .send(MatchCommand::Cancel {
            order_id: OrderId(1),
            team_id: "t1".to_string(),
            request_id: None,
        })
        .await
        .unwrap();
    match harness.trade_rx.recv().await.unwrap() {
        MatchOutcome::CancelDone { order, .. } => {
            assert_eq!(order.id, OrderId(1));
            assert_eq!(order.status, OrderStatus::Cancelled);
        }
        other => panic!("expected CancelDone, got {other:?}"),
    }

    // Nothing left for the auction.
    harness
        .phase_tx
        .send(PhaseState::for_phase(Phase::OpeningAuction))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    harness
        .phase_tx
        .send(PhaseState::for_phase(Phase::Continuous))
        .unwrap();

    harness.match_tx.send(MatchCommand::Shutdown).await.unwrap();
    match harness.trade_rx.recv().await.unwrap() {
        MatchOutcome::Shutdown => {}
        other => panic!("expected only the shutdown sentinel, got {other:?}"),
    }
    harness.handle.await.unwrap();
}
