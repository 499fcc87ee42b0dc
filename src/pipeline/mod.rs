//! The staged exchange pipeline and its composition root.
//!
//! Ingress -> validation -> matching -> publication -> position tracking
//! -> client fan-out. Each stage is one long-lived task consuming a
//! bounded FIFO queue; stages share no mutable state except the explicit
//! stores (positions, pending requests, registries). Shutdown is a
//! sentinel cascade down the chain, so the position tracker drains before
//! the fan-out closes.

pub mod fanout;
pub mod matcher;
pub mod messages;
pub mod positions;
pub mod publisher;
pub mod validator;

pub use fanout::{ConnectionMap, CONNECTION_BUFFER};
pub use matcher::MidPriceCache;
pub use positions::PositionStore;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::correlator::ResponseCoordinator;
use crate::instruments::InstrumentRegistry;
use crate::phase::{run_phase_manager, PhaseSchedule, PhaseState};
use crate::teams::{Role, TeamRegistry};
use crate::validation::ConstraintSet;
use messages::{FanoutCommand, IngressMessage};

/// Liveness of one pipeline stage, surfaced on the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStatus {
    /// Stage name
    pub name: &'static str,
    /// Whether the stage task is still running
    pub alive: bool,
}

/// Tunables for the pipeline composition root.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Bounded capacity of every inter-stage queue
    pub queue_capacity: usize,
    /// Phase manager poll interval
    pub phase_check_interval: Duration,
    /// Pending-request cleanup interval
    pub cleanup_interval: Duration,
    /// The weekly phase schedule
    pub schedule: PhaseSchedule,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            phase_check_interval: Duration::from_millis(100),
            cleanup_interval: Duration::from_secs(10),
            schedule: PhaseSchedule::always_open(),
        }
    }
}

/// The assembled pipeline: queue heads, shared stores, and worker handles.
///
/// Constructed once at startup and torn down at shutdown; HTTP handlers
/// only ever see the ingress queue sender and the read sides of the
/// stores.
pub struct Pipeline {
    /// Ingress queue fed by HTTP handlers (many producers, one consumer)
    pub order_tx: mpsc::Sender<IngressMessage>,
    /// Direct fan-out access for ingress-level rejects
    pub fanout_tx: mpsc::Sender<FanoutCommand>,
    /// Phase cell read side
    pub phase_rx: watch::Receiver<PhaseState>,
    /// Positions store (read side for REST queries)
    pub positions: Arc<PositionStore>,
    /// Socket registry shared with the WebSocket surface
    pub connections: Arc<ConnectionMap>,
    handles: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Pipeline {
    /// Build every queue, spawn every stage, and return the running
    /// pipeline.
    pub fn start(
        settings: PipelineSettings,
        teams: Arc<TeamRegistry>,
        instruments: Arc<InstrumentRegistry>,
        correlator: Arc<ResponseCoordinator>,
        constraints: Arc<HashMap<Role, ConstraintSet>>,
    ) -> Self {
        let capacity = settings.queue_capacity;
        let (order_tx, order_rx) = mpsc::channel(capacity);
        let (match_tx, match_rx) = mpsc::channel(capacity);
        let (trade_tx, trade_rx) = mpsc::channel(capacity);
        let (position_tx, position_rx) = mpsc::channel(capacity);
        let (fanout_tx, fanout_rx) = mpsc::channel(capacity);
        let (phase_tx, phase_rx) = watch::channel(PhaseState::closed());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let positions = Arc::new(PositionStore::new());
        let connections = Arc::new(ConnectionMap::new());
        let mids = Arc::new(MidPriceCache::new());

        let mut handles: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        handles.push((
            "fan_out",
            tokio::spawn(fanout::run_fanout(fanout_rx, Arc::clone(&connections))),
        ));
        handles.push((
            "position_tracker",
            tokio::spawn(positions::run_position_tracker(
                position_rx,
                Arc::clone(&positions),
                fanout_tx.clone(),
            )),
        ));
        handles.push((
            "publisher",
            tokio::spawn(publisher::run_publisher(
                trade_rx,
                publisher::PublisherDeps {
                    position_tx,
                    fanout_tx: fanout_tx.clone(),
                    correlator: Arc::clone(&correlator),
                    teams: Arc::clone(&teams),
                },
            )),
        ));
        handles.push((
            "matcher",
            tokio::spawn(matcher::run_matcher(
                match_rx,
                trade_tx,
                phase_rx.clone(),
                Arc::clone(&mids),
            )),
        ));
        handles.push((
            "validator",
            tokio::spawn(validator::run_validator(
                order_rx,
                validator::ValidatorDeps {
                    match_tx,
                    fanout_tx: fanout_tx.clone(),
                    correlator: Arc::clone(&correlator),
                    constraints,
                    instruments,
                    positions: Arc::clone(&positions),
                    mids,
                    phase_rx: phase_rx.clone(),
                },
            )),
        ));
        handles.push((
            "phase_manager",
            tokio::spawn(run_phase_manager(
                settings.schedule.clone(),
                settings.phase_check_interval,
                phase_tx,
                fanout_tx.clone(),
                shutdown_rx.clone(),
            )),
        ));
        handles.push((
            "request_cleanup",
            tokio::spawn(run_request_cleanup(
                Arc::clone(&correlator),
                settings.cleanup_interval,
                shutdown_rx,
            )),
        ));

        info!("pipeline started with {} stages", handles.len());
        Self {
            order_tx,
            fanout_tx,
            phase_rx,
            positions,
            connections,
            handles: Mutex::new(handles),
            shutdown_tx,
        }
    }

    /// Per-stage liveness. A finished task before shutdown means a dead
    /// worker; the health endpoint reports it as `thread_down`.
    pub fn stage_health(&self) -> Vec<StageStatus> {
        self.handles
            .lock()
            .iter()
            .map(|(name, handle)| StageStatus {
                name: *name,
                alive: !handle.is_finished(),
            })
            .collect()
    }

    /// Graceful teardown: push the shutdown sentinel through the chain,
    /// stop the clock-driven workers, and wait for every stage to drain.
    pub async fn shutdown(&self) {
        info!("pipeline shutting down");
        let _ = self.order_tx.send(IngressMessage::Shutdown).await;
        let _ = self.shutdown_tx.send(true);
        let drained: Vec<_> = self.handles.lock().drain(..).collect();
        for (name, handle) in drained {
            if handle.await.is_err() {
                tracing::error!("stage {name} panicked before shutdown");
            }
        }
        info!("pipeline stopped");
    }
}

/// Periodic sweep of expired pending requests.
async fn run_request_cleanup(
    correlator: Arc<ResponseCoordinator>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                correlator.cleanup_expired();
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
