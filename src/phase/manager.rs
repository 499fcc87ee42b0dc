//! Phase manager worker: polls the wall clock and publishes transitions.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;

use super::{PhaseSchedule, PhaseState};
use crate::pipeline::messages::{FanoutCommand, OutboundEvent};

/// Phase manager stage.
///
/// Polls the schedule at `check_interval` and, on a transition, writes the
/// new state to the single-writer watch cell read by the validator and
/// matcher, then broadcasts a `phase_change` message. The initial state is
/// published immediately so the pipeline never runs on a default.
pub async fn run_phase_manager(
    schedule: PhaseSchedule,
    check_interval: Duration,
    phase_tx: watch::Sender<PhaseState>,
    fanout_tx: mpsc::Sender<FanoutCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("phase manager started");
    let initial = schedule.state_at(Utc::now());
    let _ = phase_tx.send(initial);
    info!("market phase is {}", initial.phase);

    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = schedule.state_at(Utc::now());
                let current = *phase_tx.borrow();
                if state != current {
                    info!("market phase {} -> {}", current.phase, state.phase);
                    let _ = phase_tx.send(state);
                    let _ = fanout_tx
                        .send(FanoutCommand::broadcast(OutboundEvent::PhaseChange(state.into())))
                        .await;
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    info!("phase manager stopped");
}
