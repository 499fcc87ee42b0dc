//! Fan-out stage: routes typed events to per-team WebSocket writers.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::messages::{FanoutCommand, FanoutTarget, OutboundEvent};
use crate::teams::TeamId;

/// Per-connection write-buffer depth. A socket that falls this far behind
/// loses its connection rather than back-pressuring the pipeline.
pub const CONNECTION_BUFFER: usize = 256;

#[derive(Debug)]
struct Connection {
    tx: mpsc::Sender<OutboundEvent>,
    conn_id: u64,
}

/// Live socket writers, at most one per team.
///
/// Registering a new connection for a team evicts the previous one: the
/// old sender drops, its writer task sees the closed channel and closes
/// the socket. Connection ids make unregistration eviction-safe: a stale
/// connection cannot remove its replacement.
#[derive(Debug, Default)]
pub struct ConnectionMap {
    inner: DashMap<TeamId, Connection>,
    next_conn_id: AtomicU64,
}

impl ConnectionMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a team. Returns the connection id and the
    /// receiver end the socket writer drains.
    pub fn register(&self, team_id: &str) -> (u64, mpsc::Receiver<OutboundEvent>) {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER);
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        if self
            .inner
            .insert(team_id.to_string(), Connection { tx, conn_id })
            .is_some()
        {
            debug!("evicted previous connection for team {team_id}");
        }
        (conn_id, rx)
    }

    /// Remove a team's connection, but only if it is still the one
    /// identified by `conn_id`.
    pub fn unregister(&self, team_id: &str, conn_id: u64) {
        self.inner
            .remove_if(team_id, |_, connection| connection.conn_id == conn_id);
    }

    /// Number of connected teams.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no teams are connected.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Deliver to one team. Offline teams are skipped; a full buffer drops
    /// the connection.
    fn deliver(&self, team_id: &str, event: OutboundEvent) {
        let Some(entry) = self.inner.get(team_id) else {
            return;
        };
        match entry.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let conn_id = entry.conn_id;
                drop(entry);
                warn!("write buffer overflow for team {team_id}; dropping connection");
                self.unregister(team_id, conn_id);
            }
            Err(TrySendError::Closed(_)) => {
                let conn_id = entry.conn_id;
                drop(entry);
                self.unregister(team_id, conn_id);
            }
        }
    }

    /// Deliver to every connected team under the same overflow policy.
    fn broadcast(&self, event: &OutboundEvent) {
        let mut dropped: Vec<(TeamId, u64)> = Vec::new();
        for entry in self.inner.iter() {
            match entry.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "write buffer overflow for team {}; dropping connection",
                        entry.key()
                    );
                    dropped.push((entry.key().clone(), entry.conn_id));
                }
                Err(TrySendError::Closed(_)) => {
                    dropped.push((entry.key().clone(), entry.conn_id));
                }
            }
        }
        for (team_id, conn_id) in dropped {
            self.unregister(&team_id, conn_id);
        }
    }
}

/// Fan-out stage: single consumer of the fan-out queue and single writer
/// of socket state. Messages for offline teams are dropped, never queued.
pub async fn run_fanout(
    mut rx: mpsc::Receiver<FanoutCommand>,
    connections: std::sync::Arc<ConnectionMap>,
) {
    info!("fan-out started");
    while let Some(command) = rx.recv().await {
        match command {
            FanoutCommand::Deliver { target, event } => match target {
                FanoutTarget::Team(team_id) => connections.deliver(&team_id, event),
                FanoutTarget::Broadcast => connections.broadcast(&event),
            },
            FanoutCommand::Shutdown => break,
        }
    }
    info!("fan-out stopped");
}
