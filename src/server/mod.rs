//! REST and WebSocket surface over the pipeline.

mod error;
mod rest;
mod ws;

pub use error::ApiError;

use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::config::ExchangeConfig;
use crate::correlator::ResponseCoordinator;
use crate::instruments::InstrumentRegistry;
use crate::orderbook::OrderIdGenerator;
use crate::pipeline::Pipeline;
use crate::teams::{Team, TeamRegistry};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The running pipeline (queue heads, stores, health)
    pub pipeline: Arc<Pipeline>,
    /// Team registry for auth and registration
    pub teams: Arc<TeamRegistry>,
    /// Listed instruments
    pub instruments: Arc<InstrumentRegistry>,
    /// Pending-request table
    pub correlator: Arc<ResponseCoordinator>,
    /// Server-side order id sequence
    pub order_ids: Arc<OrderIdGenerator>,
    /// How long ingress may block on a full order queue before a 503
    pub order_queue_timeout: Duration,
}

impl AppState {
    /// Assemble the server state around a running pipeline.
    pub fn new(
        pipeline: Arc<Pipeline>,
        teams: Arc<TeamRegistry>,
        instruments: Arc<InstrumentRegistry>,
        correlator: Arc<ResponseCoordinator>,
        config: &ExchangeConfig,
    ) -> Self {
        Self {
            pipeline,
            teams,
            instruments,
            correlator,
            order_ids: Arc::new(OrderIdGenerator::new()),
            order_queue_timeout: config.order_queue_timeout(),
        }
    }

    /// Resolve the team behind a `Authorization: Bearer <api_key>` header.
    pub fn bearer_team(&self, headers: &HeaderMap) -> Result<Arc<Team>, ApiError> {
        let token = headers
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;
        self.teams.authenticate(token).ok_or(ApiError::Unauthorized)
    }
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(rest::health))
        .route("/game/teams", post(rest::create_team))
        .route("/exchange/orders", post(rest::submit_order))
        .route("/exchange/orders/:order_id", delete(rest::cancel_order))
        .route("/positions", get(rest::get_positions))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
