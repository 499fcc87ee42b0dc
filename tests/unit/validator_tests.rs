//! Validator stage behaviour: gating order, rejection codes, and the
//! messages it produces.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use optex_rs::correlator::ResponseCoordinator;
use optex_rs::instruments::{Instrument, InstrumentRegistry};
use optex_rs::orderbook::{Order, OrderId, Side};
use optex_rs::phase::PhaseState;
use optex_rs::pipeline::matcher::MidPriceCache;
use optex_rs::pipeline::messages::{FanoutCommand, IngressMessage, MatchCommand};
use optex_rs::pipeline::validator::{run_validator, ValidatorDeps};
use optex_rs::pipeline::PositionStore;
use optex_rs::teams::Role;
use optex_rs::validation::{ConstraintKind, ConstraintRule, ConstraintSet};
use tokio::sync::{mpsc, watch};

struct ValidatorHarness {
    order_tx: mpsc::Sender<IngressMessage>,
    match_rx: mpsc::Receiver<MatchCommand>,
    fanout_rx: mpsc::Receiver<FanoutCommand>,
    handle: tokio::task::JoinHandle<()>,
    // Held so the phase watch channel stays open for the stage.
    _phase_tx: watch::Sender<PhaseState>,
}

fn spawn_validator(
    constraints: HashMap<Role, ConstraintSet>,
    phase: PhaseState,
) -> ValidatorHarness {
    let (order_tx, order_rx) = mpsc::channel(64);
    let (match_tx, match_rx) = mpsc::channel(64);
    let (fanout_tx, fanout_rx) = mpsc::channel(64);
    let (phase_tx, phase_rx) = watch::channel(phase);

    let deps = ValidatorDeps {
        match_tx,
        fanout_tx,
        correlator: Arc::new(ResponseCoordinator::new(Duration::from_secs(1), 100)),
        constraints: Arc::new(constraints),
        instruments: Arc::new(InstrumentRegistry::from_instruments([
            Instrument::underlying("TEST"),
        ])),
        positions: Arc::new(PositionStore::new()),
        mids: Arc::new(MidPriceCache::new()),
        phase_rx,
    };
    let handle = tokio::spawn(run_validator(order_rx, deps));
    ValidatorHarness {
        order_tx,
        match_rx,
        fanout_rx,
        handle,
        _phase_tx: phase_tx,
    }
}

fn order(id: u64, symbol: &str, quantity: u64) -> Order {
    Order::new(
        OrderId(id),
        Some(format!("c-{id}")),
        "team-1".to_string(),
        symbol,
        Side::Buy,
        quantity,
        Some(525),
        0,
    )
}

async fn submit(harness: &ValidatorHarness, o: Order) {
    harness
        .order_tx
        .send(IngressMessage::Submit {
            order: o,
            role: Role::HedgeFund,
            request_id: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_accept_stamps_submission_time_and_acks() {
    let mut harness = spawn_validator(HashMap::new(), PhaseState::continuous());

    submit(&harness, order(1, "TEST", 10)).await;
    submit(&harness, order(2, "TEST", 10)).await;

    let first = match harness.match_rx.recv().await.unwrap() {
        MatchCommand::Submit { order, .. } => order,
        other => panic!("expected Submit, got {other:?}"),
    };
    let second = match harness.match_rx.recv().await.unwrap() {
        MatchCommand::Submit { order, .. } => order,
        other => panic!("expected Submit, got {other:?}"),
    };
    assert!(first.submitted_at > 0);
    // Stamps are strictly monotonic in arrival order.
    assert!(second.submitted_at > first.submitted_at);

    match harness.fanout_rx.recv().await.unwrap() {
        FanoutCommand::Deliver { event, .. } => assert_eq!(event.message_type(), "order_ack"),
        other => panic!("expected a delivery, got {other:?}"),
    }

    harness.order_tx.send(IngressMessage::Shutdown).await.unwrap();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_unknown_instrument_rejected() {
    let mut harness = spawn_validator(HashMap::new(), PhaseState::continuous());

    submit(&harness, order(1, "GHOST", 10)).await;

    match harness.fanout_rx.recv().await.unwrap() {
        FanoutCommand::Deliver { event, .. } => {
            assert_eq!(event.message_type(), "order_reject");
            let data = event.to_data();
            assert_eq!(data["reject_code"], "INVALID_INSTRUMENT");
        }
        other => panic!("expected a delivery, got {other:?}"),
    }

    harness.order_tx.send(IngressMessage::Shutdown).await.unwrap();
    harness.handle.await.unwrap();
    // Nothing reached the match queue but the shutdown sentinel.
    assert!(matches!(
        harness.match_rx.recv().await,
        Some(MatchCommand::Shutdown)
    ));
}

#[tokio::test]
async fn test_market_closed_wins_over_constraints() {
    // Even a constraint that rejects everything is never consulted when
    // the market is closed.
    let mut constraints = HashMap::new();
    constraints.insert(
        Role::HedgeFund,
        ConstraintSet::new(vec![ConstraintRule::new(
            ConstraintKind::PositionLimit {
                max: 0,
                symmetric: true,
            },
            "HF_POS_LIMIT",
            "never",
        )]),
    );
    let mut harness = spawn_validator(constraints, PhaseState::closed());

    submit(&harness, order(1, "TEST", 10)).await;

    match harness.fanout_rx.recv().await.unwrap() {
        FanoutCommand::Deliver { event, .. } => {
            let data = event.to_data();
            assert_eq!(data["reject_code"], "MARKET_CLOSED");
        }
        other => panic!("expected a delivery, got {other:?}"),
    }

    harness.order_tx.send(IngressMessage::Shutdown).await.unwrap();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_constraint_code_from_configuration() {
    let mut constraints = HashMap::new();
    constraints.insert(
        Role::HedgeFund,
        ConstraintSet::new(vec![ConstraintRule::new(
            ConstraintKind::InstrumentAllowed {
                whitelist: vec!["OTHER".to_string()],
            },
            "HF_INSTRUMENT",
            "hedge funds may not trade TEST",
        )]),
    );
    let mut harness = spawn_validator(constraints, PhaseState::continuous());

    submit(&harness, order(1, "TEST", 10)).await;

    match harness.fanout_rx.recv().await.unwrap() {
        FanoutCommand::Deliver { event, .. } => {
            let data = event.to_data();
            assert_eq!(data["reject_code"], "HF_INSTRUMENT");
            assert_eq!(data["reject_reason"], "hedge funds may not trade TEST");
            assert_eq!(data["client_order_id"], "c-1");
        }
        other => panic!("expected a delivery, got {other:?}"),
    }

    harness.order_tx.send(IngressMessage::Shutdown).await.unwrap();
    harness.handle.await.unwrap();
}

#[tokio::test]
async fn test_cancel_gated_by_phase() {
    let mut harness = spawn_validator(HashMap::new(), PhaseState::closed());

    harness
        .order_tx
        .send(IngressMessage::Cancel {
            order_id: OrderId(5),
            team_id: "team-1".to_string(),
            request_id: None,
        })
        .await
        .unwrap();

    match harness.fanout_rx.recv().await.unwrap() {
        FanoutCommand::Deliver { event, .. } => {
            assert_eq!(event.message_type(), "cancel_reject");
        }
        other => panic!("expected a delivery, got {other:?}"),
    }

    harness.order_tx.send(IngressMessage::Shutdown).await.unwrap();
    harness.handle.await.unwrap();
}
