//! Request/response correlation: bridges the asynchronous pipeline to
//! synchronous REST semantics.
//!
//! Every REST submission registers a pending record with a completion
//! signal and a deadline. Whichever stage reaches a terminal outcome for
//! the request resolves it; the HTTP handler wakes and replies. Expired
//! records are abandoned and late outcomes are discarded.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::orderbook::{OrderId, OrderStatus, Side};

/// One fill as reported back on the REST submission response.
#[derive(Debug, Clone, Serialize)]
pub struct FillInfo {
    /// Trade this fill belongs to
    pub trade_id: Uuid,
    /// Execution price in dollars
    pub price: f64,
    /// Executed quantity
    pub quantity: u64,
    /// Whether this side added or removed liquidity
    pub liquidity: Liquidity,
    /// Signed fee in dollars (positive = credit)
    pub fee: f64,
    /// Team on the other side of the fill
    pub counterparty: String,
}

/// Maker/taker attribution for one side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Liquidity {
    /// Resting side
    Maker,
    /// Aggressing side
    Taker,
}

impl Liquidity {
    /// Attribution for `side` of a trade whose aggressor was
    /// `aggressor_side`.
    #[must_use]
    pub fn for_side(side: Side, aggressor_side: Side) -> Self {
        if side == aggressor_side {
            Liquidity::Taker
        } else {
            Liquidity::Maker
        }
    }
}

/// Terminal outcome of an order submission.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReply {
    /// Server-assigned id; present whenever the order passed ingress
    pub order_id: OrderId,
    /// Echo of the client's id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// Final (or resting) status at resolution time
    pub status: OrderStatus,
    /// Fills executed on arrival
    pub fills: Vec<FillInfo>,
    /// Stable rejection code, when rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_code: Option<String>,
    /// Human-readable rejection reason, when rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

/// Terminal outcome of a cancellation request.
#[derive(Debug, Clone, Serialize)]
pub struct CancelReply {
    /// The order targeted
    pub order_id: OrderId,
    /// Whether the order was actually removed
    pub cancelled: bool,
    /// Failure reason when `cancelled` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What the pipeline hands back through a pending record.
#[derive(Debug, Clone)]
pub enum PipelineReply {
    /// Order submission outcome
    Order(OrderReply),
    /// Cancellation outcome
    Cancel(CancelReply),
}

/// Why a registration or wait failed.
#[derive(Debug, Error)]
pub enum CorrelationError {
    /// Pending table is at capacity
    #[error("pending request table is full ({0} requests)")]
    Overloaded(usize),
    /// Deadline expired before any stage resolved the request
    #[error("request {0} timed out")]
    Timeout(Uuid),
}

struct Pending {
    tx: oneshot::Sender<PipelineReply>,
    deadline: Instant,
}

/// The pending-request table.
///
/// A single mutex guards the map; critical sections only insert/remove,
/// so contention stays negligible next to the queue hops around it.
pub struct ResponseCoordinator {
    pending: Mutex<HashMap<Uuid, Pending>>,
    default_timeout: Duration,
    max_pending: usize,
}

impl ResponseCoordinator {
    /// Create a coordinator with the given default timeout and capacity.
    pub fn new(default_timeout: Duration, max_pending: usize) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            default_timeout,
            max_pending,
        }
    }

    /// Register a new pending request.
    ///
    /// Returns the request id and the receiver the caller parks on.
    ///
    /// # Errors
    /// [`CorrelationError::Overloaded`] at capacity; nothing is registered.
    pub fn register(&self) -> Result<(Uuid, oneshot::Receiver<PipelineReply>), CorrelationError> {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock();
        if pending.len() >= self.max_pending {
            return Err(CorrelationError::Overloaded(pending.len()));
        }
        pending.insert(
            request_id,
            Pending {
                tx,
                deadline: Instant::now() + self.default_timeout,
            },
        );
        Ok((request_id, rx))
    }

    /// Resolve a pending request with its outcome.
    ///
    /// Late or unknown resolutions are discarded: the record is already
    /// gone once the deadline fires or the caller went away.
    pub fn resolve(&self, request_id: Uuid, reply: PipelineReply) {
        let entry = self.pending.lock().remove(&request_id);
        match entry {
            Some(record) => {
                if record.tx.send(reply).is_err() {
                    debug!("request {request_id} resolved after caller departed; discarding");
                }
            }
            None => {
                debug!("request {request_id} not pending (expired or resolved); discarding outcome");
            }
        }
    }

    /// Park until the request resolves or its deadline passes.
    ///
    /// On timeout the record is abandoned so a later resolution is
    /// discarded, and the 504 surface carries the request id.
    pub async fn wait(
        &self,
        request_id: Uuid,
        rx: oneshot::Receiver<PipelineReply>,
    ) -> Result<PipelineReply, CorrelationError> {
        match tokio::time::timeout(self.default_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                // Sender dropped without resolving: treat like a timeout.
                self.abandon(request_id);
                warn!("pipeline dropped request {request_id} without resolving");
                Err(CorrelationError::Timeout(request_id))
            }
            Err(_) => {
                self.abandon(request_id);
                Err(CorrelationError::Timeout(request_id))
            }
        }
    }

    /// Drop a pending record without resolving it.
    pub fn abandon(&self, request_id: Uuid) {
        self.pending.lock().remove(&request_id);
    }

    /// Remove every record whose deadline has passed. Run periodically so
    /// records abandoned without a waiter cannot accumulate.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, record| record.deadline > now);
        let removed = before - pending.len();
        if removed > 0 {
            debug!("cleaned up {removed} expired pending requests");
        }
        removed
    }

    /// Number of requests currently parked.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// The configured default timeout.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}
