//! Matcher stage: the sole mutator of all order books.
//!
//! Per-instrument ordering is deterministic because this stage is the
//! single consumer of the match queue and the only task that touches a
//! book. Cancellations ride the same queue as submissions, so a team's
//! operations apply in the order it issued them.

use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::messages::{MatchCommand, MatchOutcome};
use crate::orderbook::{Order, OrderBook, OrderBookError, OrderId, OrderStatus};
use crate::phase::{ExecutionStyle, PhaseState};
use crate::teams::TeamId;

/// Mid prices published by the matcher after every book operation, read by
/// the validator's price-range constraint. The matcher is the only writer.
#[derive(Debug, Default)]
pub struct MidPriceCache {
    mids: DashMap<String, f64>,
}

impl MidPriceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mid for a symbol, when the book is two-sided.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.mids.get(symbol).map(|entry| *entry)
    }

    fn publish(&self, symbol: &str, mid: Option<f64>) {
        match mid {
            Some(value) => {
                self.mids.insert(symbol.to_string(), value);
            }
            None => {
                self.mids.remove(symbol);
            }
        }
    }
}

/// Matcher stage entry point.
///
/// While `match_enabled` is off, submissions collect in a holding buffer in
/// arrival order. On the transition into matching, a batch phase clears
/// through the opening auction first; everything still buffered (market
/// orders, late arrivals) then releases continuously in arrival order.
pub async fn run_matcher(
    mut rx: mpsc::Receiver<MatchCommand>,
    trade_tx: mpsc::Sender<MatchOutcome>,
    mut phase_rx: watch::Receiver<PhaseState>,
    mids: Arc<MidPriceCache>,
) {
    info!("matcher started");
    let mut books: HashMap<String, OrderBook> = HashMap::new();
    let mut buffer: VecDeque<(Order, Option<Uuid>)> = VecDeque::new();
    let mut phase = *phase_rx.borrow();
    let mut phase_open = true;

    loop {
        tokio::select! {
            changed = phase_rx.changed(), if phase_open => {
                if changed.is_err() {
                    // Phase manager is gone; keep trading under the last
                    // known state and stop polling the dead cell.
                    phase_open = false;
                    continue;
                }
                let next = *phase_rx.borrow_and_update();
                if next.match_enabled && !phase.match_enabled {
                    if phase.execution_style == ExecutionStyle::Batch {
                        run_opening_auction(&mut books, &mut buffer, &trade_tx, &mids).await;
                    }
                    release_buffer(&mut books, &mut buffer, &trade_tx, &mids).await;
                }
                phase = next;
            }
            message = rx.recv() => {
                let Some(message) = message else { break };
                match message {
                    MatchCommand::Submit { order, request_id } => {
                        if phase.match_enabled {
                            submit(&mut books, order, request_id, &trade_tx, &mids).await;
                        } else {
                            debug!("buffering order {} while matching is disabled", order.id);
                            let outcome = MatchOutcome::Buffered {
                                order: order.clone(),
                                request_id,
                            };
                            buffer.push_back((order, request_id));
                            if trade_tx.send(outcome).await.is_err() {
                                break;
                            }
                        }
                    }
                    MatchCommand::Cancel { order_id, team_id, request_id } => {
                        let outcome = cancel(&mut books, &mut buffer, order_id, &team_id, request_id, &mids);
                        if trade_tx.send(outcome).await.is_err() {
                            break;
                        }
                    }
                    MatchCommand::Shutdown => break,
                }
            }
        }
    }

    let _ = trade_tx.send(MatchOutcome::Shutdown).await;
    info!("matcher stopped");
}

async fn submit(
    books: &mut HashMap<String, OrderBook>,
    order: Order,
    request_id: Option<Uuid>,
    trade_tx: &mpsc::Sender<MatchOutcome>,
    mids: &MidPriceCache,
) {
    let book = books
        .entry(order.symbol.clone())
        .or_insert_with_key(|symbol| OrderBook::new(symbol));
    let outcome = match book.insert(order.clone()) {
        Ok(result) => MatchOutcome::Executed { result, request_id },
        Err(err) => {
            // The validator guarantees well-formed orders; reaching this
            // arm is an internal fault, surfaced as a rejection.
            error!("book refused validated order {}: {}", order.id, err);
            let mut rejected = order;
            rejected.status = OrderStatus::Rejected;
            MatchOutcome::Executed {
                result: crate::orderbook::MatchResult::unmatched(rejected),
                request_id,
            }
        }
    };
    mids.publish(book.symbol(), book.mid_price());
    let _ = trade_tx.send(outcome).await;
}

fn cancel(
    books: &mut HashMap<String, OrderBook>,
    buffer: &mut VecDeque<(Order, Option<Uuid>)>,
    order_id: OrderId,
    team_id: &TeamId,
    request_id: Option<Uuid>,
    mids: &MidPriceCache,
) -> MatchOutcome {
    // Buffered orders have not reached a book yet but are still
    // cancellable by their owner.
    if let Some(idx) = buffer.iter().position(|(o, _)| o.id == order_id) {
        if &buffer[idx].0.team_id != team_id {
            return MatchOutcome::CancelFailed {
                order_id,
                team_id: team_id.clone(),
                reason: OrderBookError::NotOwner {
                    order_id,
                    team_id: team_id.clone(),
                },
                request_id,
            };
        }
        let (mut order, _) = buffer.remove(idx).expect("index from position");
        order.status = OrderStatus::Cancelled;
        return MatchOutcome::CancelDone { order, request_id };
    }

    let Some(book) = books.values_mut().find(|b| b.contains(order_id)) else {
        return MatchOutcome::CancelFailed {
            order_id,
            team_id: team_id.clone(),
            reason: OrderBookError::OrderNotFound(order_id),
            request_id,
        };
    };
    match book.cancel(order_id, team_id) {
        Ok(order) => {
            mids.publish(&order.symbol, book.mid_price());
            MatchOutcome::CancelDone { order, request_id }
        }
        Err(reason) => MatchOutcome::CancelFailed {
            order_id,
            team_id: team_id.clone(),
            reason,
            request_id,
        },
    }
}

/// Place buffered limit orders resting and clear each touched book with a
/// single batch cross. Market orders cannot participate (no limit price)
/// and stay buffered for continuous release afterwards.
async fn run_opening_auction(
    books: &mut HashMap<String, OrderBook>,
    buffer: &mut VecDeque<(Order, Option<Uuid>)>,
    trade_tx: &mpsc::Sender<MatchOutcome>,
    mids: &MidPriceCache,
) {
    let mut touched: Vec<String> = Vec::new();
    let mut held_markets: VecDeque<(Order, Option<Uuid>)> = VecDeque::new();

    while let Some((order, request_id)) = buffer.pop_front() {
        if order.is_market() {
            held_markets.push_back((order, request_id));
            continue;
        }
        let book = books
            .entry(order.symbol.clone())
            .or_insert_with_key(|symbol| OrderBook::new(symbol));
        if !touched.contains(&order.symbol) {
            touched.push(order.symbol.clone());
        }
        if let Err(err) = book.insert_resting(order.clone()) {
            error!("failed to rest buffered order {}: {}", order.id, err);
        }
    }
    *buffer = held_markets;

    for symbol in touched {
        let book = books.get_mut(&symbol).expect("touched symbol has a book");
        if let Some(result) = book.run_auction() {
            info!(
                "opening auction on {}: {} trades at {}",
                symbol,
                result.trades.len(),
                result.clearing_price
            );
            mids.publish(&symbol, book.mid_price());
            if trade_tx
                .send(MatchOutcome::AuctionCleared {
                    symbol: symbol.clone(),
                    result,
                })
                .await
                .is_err()
            {
                warn!("trade queue closed during auction publication");
                return;
            }
        } else {
            mids.publish(&symbol, book.mid_price());
        }
    }
}

/// Release buffered orders in arrival order with continuous matching.
async fn release_buffer(
    books: &mut HashMap<String, OrderBook>,
    buffer: &mut VecDeque<(Order, Option<Uuid>)>,
    trade_tx: &mpsc::Sender<MatchOutcome>,
    mids: &MidPriceCache,
) {
    if !buffer.is_empty() {
        info!("releasing {} buffered orders", buffer.len());
    }
    while let Some((order, _)) = buffer.pop_front() {
        // The REST caller was already answered at buffering time, so the
        // release carries no request id.
        submit(books, order, None, trade_tx, mids).await;
    }
}
