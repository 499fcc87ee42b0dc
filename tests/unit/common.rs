//! Shared fixtures: an in-process exchange wired exactly like the daemon,
//! minus the HTTP layer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use optex_rs::config::ExchangeConfig;
use optex_rs::correlator::{CancelReply, OrderReply, PipelineReply, ResponseCoordinator};
use optex_rs::instruments::{Instrument, InstrumentRegistry};
use optex_rs::orderbook::{Order, OrderId, OrderIdGenerator, Side};
use optex_rs::phase::{Phase, PhaseSchedule};
use optex_rs::pipeline::messages::{IngressMessage, OutboundEvent};
use optex_rs::pipeline::{Pipeline, PipelineSettings};
use optex_rs::teams::{Role, Team, TeamRegistry};
use optex_rs::validation::ConstraintSet;
use tokio::sync::mpsc;

/// A running pipeline plus everything a test needs to poke at it.
pub struct TestExchange {
    pub pipeline: Arc<Pipeline>,
    pub teams: Arc<TeamRegistry>,
    pub correlator: Arc<ResponseCoordinator>,
    pub order_ids: OrderIdGenerator,
}

impl TestExchange {
    /// Start a pipeline on the given schedule with default constraints and
    /// one `TEST` underlying.
    pub fn start(schedule: PhaseSchedule) -> Self {
        Self::start_with(schedule, default_constraints(), Duration::from_secs(2))
    }

    /// Start with custom constraints and request timeout.
    pub fn start_with(
        schedule: PhaseSchedule,
        constraints: HashMap<Role, ConstraintSet>,
        request_timeout: Duration,
    ) -> Self {
        let teams = Arc::new(TeamRegistry::new());
        let instruments = Arc::new(InstrumentRegistry::from_instruments([
            Instrument::underlying("TEST"),
        ]));
        let correlator = Arc::new(ResponseCoordinator::new(request_timeout, 1000));
        let settings = PipelineSettings {
            queue_capacity: 256,
            phase_check_interval: Duration::from_millis(10),
            cleanup_interval: Duration::from_millis(100),
            schedule,
        };
        let pipeline = Arc::new(Pipeline::start(
            settings,
            Arc::clone(&teams),
            instruments,
            Arc::clone(&correlator),
            Arc::new(constraints),
        ));
        Self {
            pipeline,
            teams,
            correlator,
            order_ids: OrderIdGenerator::new(),
        }
    }

    /// Block until the phase cell shows the expected phase.
    pub async fn wait_for_phase(&self, phase: Phase) {
        let mut phase_rx = self.pipeline.phase_rx.clone();
        for _ in 0..200 {
            if phase_rx.borrow_and_update().phase == phase {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("phase never became {phase}");
    }

    /// Submit an order on TEST and wait for the pipeline's answer.
    pub async fn submit(
        &self,
        team: &Team,
        side: Side,
        quantity: u64,
        price: Option<u64>,
    ) -> OrderReply {
        self.submit_with_client_id(team, side, quantity, price, None)
            .await
    }

    /// Submit with an explicit client order id.
    pub async fn submit_with_client_id(
        &self,
        team: &Team,
        side: Side,
        quantity: u64,
        price: Option<u64>,
        client_order_id: Option<String>,
    ) -> OrderReply {
        let (request_id, rx) = self.correlator.register().expect("table has room");
        let order = Order::new(
            self.order_ids.next_id(),
            client_order_id,
            team.team_id.clone(),
            "TEST",
            side,
            quantity,
            price,
            0,
        );
        self.pipeline
            .order_tx
            .send(IngressMessage::Submit {
                order,
                role: team.role,
                request_id: Some(request_id),
            })
            .await
            .expect("order queue open");
        match self.correlator.wait(request_id, rx).await {
            Ok(PipelineReply::Order(reply)) => reply,
            other => panic!("expected an order reply, got {other:?}"),
        }
    }

    /// Cancel an order and wait for the pipeline's answer.
    pub async fn cancel(&self, team: &Team, order_id: OrderId) -> CancelReply {
        let (request_id, rx) = self.correlator.register().expect("table has room");
        self.pipeline
            .order_tx
            .send(IngressMessage::Cancel {
                order_id,
                team_id: team.team_id.clone(),
                request_id: Some(request_id),
            })
            .await
            .expect("order queue open");
        match self.correlator.wait(request_id, rx).await {
            Ok(PipelineReply::Cancel(reply)) => reply,
            other => panic!("expected a cancel reply, got {other:?}"),
        }
    }

    /// Attach a fan-out listener for a team, as a WebSocket would.
    pub fn listen(&self, team: &Team) -> mpsc::Receiver<OutboundEvent> {
        let (_conn_id, rx) = self.pipeline.connections.register(&team.team_id);
        rx
    }

    /// Tear the pipeline down.
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }
}

/// The built-in role constraint sets.
pub fn default_constraints() -> HashMap<Role, ConstraintSet> {
    ExchangeConfig::default()
        .constraint_sets()
        .expect("defaults are valid")
}

/// A schedule with no windows at all: permanently closed.
pub fn always_closed() -> PhaseSchedule {
    PhaseSchedule::new(
        chrono::FixedOffset::east_opt(0).unwrap(),
        Vec::new(),
    )
}

/// Poll an assertion until it holds or the deadline passes.
pub async fn eventually(mut check: impl FnMut() -> bool, what: &str) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held: {what}");
}

/// Drain every currently buffered event from a listener.
pub async fn drain_events(rx: &mut mpsc::Receiver<OutboundEvent>) -> Vec<OutboundEvent> {
    // Give in-flight messages a moment to land first.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Count events of one wire type.
pub fn count_of(events: &[OutboundEvent], message_type: &str) -> usize {
    events
        .iter()
        .filter(|e| e.message_type() == message_type)
        .count()
}
