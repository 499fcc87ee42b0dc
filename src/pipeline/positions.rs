//! Per-team position accounting and the position-tracker stage.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::messages::{FanoutCommand, OutboundEvent, PositionCommand, PositionSnapshotData};
use crate::orderbook::Trade;
use crate::teams::TeamId;

/// Net positions per (team, instrument).
///
/// The tracker stage is the single writer by construction; the lock exists
/// because REST position queries read concurrently. One coarse lock is
/// deliberate: the contention profile does not justify anything finer.
#[derive(Debug, Default)]
pub struct PositionStore {
    inner: RwLock<HashMap<TeamId, HashMap<String, i64>>>,
}

impl PositionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one trade: buyer gains `quantity`, seller loses it.
    ///
    /// A self-trade nets to zero but still passes through so both legs are
    /// accounted identically.
    pub fn apply_trade(&self, trade: &Trade) {
        let mut inner = self.inner.write();
        *inner
            .entry(trade.buyer_team_id.clone())
            .or_default()
            .entry(trade.symbol.clone())
            .or_insert(0) += trade.quantity as i64;
        *inner
            .entry(trade.seller_team_id.clone())
            .or_default()
            .entry(trade.symbol.clone())
            .or_insert(0) -= trade.quantity as i64;
    }

    /// All positions for one team. Unknown teams have no positions.
    pub fn positions_for(&self, team_id: &str) -> HashMap<String, i64> {
        self.inner
            .read()
            .get(team_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Net position of one team on one instrument.
    pub fn net(&self, team_id: &str, symbol: &str) -> i64 {
        self.inner
            .read()
            .get(team_id)
            .and_then(|positions| positions.get(symbol))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of absolute positions across all of a team's instruments.
    pub fn portfolio_abs(&self, team_id: &str) -> i64 {
        self.inner
            .read()
            .get(team_id)
            .map(|positions| positions.values().map(|p| p.abs()).sum())
            .unwrap_or(0)
    }

    /// Sum of every team's position on one instrument. Zero by invariant.
    pub fn instrument_sum(&self, symbol: &str) -> i64 {
        self.inner
            .read()
            .values()
            .filter_map(|positions| positions.get(symbol))
            .sum()
    }
}

/// Position-tracker stage: single consumer of the position queue.
///
/// Applies each trade's deltas, then pushes a `position_snapshot` to each
/// involved team. Drains its queue completely before exiting so in-flight
/// trades are never lost at shutdown; the fan-out sentinel goes out last.
pub async fn run_position_tracker(
    mut rx: mpsc::Receiver<PositionCommand>,
    store: Arc<PositionStore>,
    fanout_tx: mpsc::Sender<FanoutCommand>,
) {
    info!("position tracker started");
    while let Some(command) = rx.recv().await {
        match command {
            PositionCommand::Apply { trade } => {
                store.apply_trade(&trade);
                debug!(
                    "applied trade {}: {} {} x {} ({} / {})",
                    trade.trade_id,
                    trade.symbol,
                    trade.quantity,
                    trade.price,
                    trade.buyer_team_id,
                    trade.seller_team_id
                );
                let mut teams = vec![&trade.buyer_team_id];
                if trade.seller_team_id != trade.buyer_team_id {
                    teams.push(&trade.seller_team_id);
                }
                for team_id in teams {
                    let snapshot = OutboundEvent::PositionSnapshot(PositionSnapshotData {
                        positions: store.positions_for(team_id),
                    });
                    if fanout_tx
                        .send(FanoutCommand::to_team(team_id.clone(), snapshot))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
            PositionCommand::Shutdown => break,
        }
    }
    let _ = fanout_tx.send(FanoutCommand::Shutdown).await;
    info!("position tracker stopped");
}
