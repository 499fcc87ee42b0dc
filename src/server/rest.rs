//! REST handlers: registration, order entry, cancellation, positions,
//! health.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::correlator::{CorrelationError, OrderReply, PipelineReply};
use crate::orderbook::{Order, OrderId, OrderStatus, Side};
use crate::pipeline::messages::{
    dollars_to_cents, FanoutCommand, IngressMessage, OrderRejectData, OutboundEvent,
};
use crate::teams::Role;

#[derive(Debug, Deserialize)]
pub(super) struct CreateTeamRequest {
    team_name: String,
    role: String,
}

/// `POST /game/teams`: register a team and issue its API key.
pub(super) async fn create_team(
    State(state): State<AppState>,
    Json(body): Json<CreateTeamRequest>,
) -> Result<Json<Value>, ApiError> {
    let role: Role = body
        .role
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid role: {}", body.role)))?;
    if body.team_name.trim().is_empty() {
        return Err(ApiError::BadRequest("team_name is required".to_string()));
    }
    let team = state.teams.register(body.team_name.trim(), role);
    Ok(Json(json!({
        "team_id": team.team_id,
        "team_name": team.team_name,
        "role": team.role,
        "api_key": team.api_key,
    })))
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderRequest {
    instrument: String,
    side: Side,
    quantity: u64,
    price: Option<f64>,
    client_order_id: Option<String>,
}

/// `POST /exchange/orders`: submit an order and park until the pipeline
/// answers.
///
/// Protocol errors are 4xx; business rejections come back 200 with a
/// reject payload because the protocol accepted the order and the
/// exchange refused it.
pub(super) async fn submit_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OrderRequest>,
) -> Result<Json<Value>, ApiError> {
    let team = state.bearer_team(&headers)?;
    if body.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be positive".to_string()));
    }
    if body.instrument.is_empty() {
        return Err(ApiError::BadRequest("instrument is required".to_string()));
    }

    let order_id = state.order_ids.next_id();
    let price = match body.price {
        None => None,
        Some(dollars) if dollars <= 0.0 || !dollars.is_finite() => {
            return Err(ApiError::BadRequest("price must be positive".to_string()));
        }
        Some(dollars) => match dollars_to_cents(dollars) {
            Some(cents) => Some(cents),
            None => {
                // On-tick prices are representable; anything else is a
                // business rejection, mirrored onto the fan-out stream.
                return Ok(Json(tick_reject(&state, order_id, &team.team_id, &body).await));
            }
        },
    };

    let (request_id, rx) = state
        .correlator
        .register()
        .map_err(|_| ApiError::Overloaded)?;

    // submitted_at is stamped by the validator; 0 marks "not yet stamped".
    let order = Order::new(
        order_id,
        body.client_order_id.clone(),
        team.team_id.clone(),
        body.instrument.clone(),
        body.side,
        body.quantity,
        price,
        0,
    );
    let message = IngressMessage::Submit {
        order,
        role: team.role,
        request_id: Some(request_id),
    };
    if state
        .pipeline
        .order_tx
        .send_timeout(message, state.order_queue_timeout)
        .await
        .is_err()
    {
        state.correlator.abandon(request_id);
        return Err(ApiError::Overloaded);
    }

    match state.correlator.wait(request_id, rx).await {
        Ok(PipelineReply::Order(reply)) => Ok(Json(
            serde_json::to_value(reply).unwrap_or_else(|_| json!({})),
        )),
        Ok(PipelineReply::Cancel(_)) => {
            // A submission can only resolve as an order outcome.
            Err(ApiError::Timeout(request_id))
        }
        Err(CorrelationError::Timeout(id)) => Err(ApiError::Timeout(id)),
        Err(CorrelationError::Overloaded(_)) => Err(ApiError::Overloaded),
    }
}

async fn tick_reject(
    state: &AppState,
    order_id: OrderId,
    team_id: &str,
    body: &OrderRequest,
) -> Value {
    let reject = OutboundEvent::OrderReject(OrderRejectData {
        client_order_id: body.client_order_id.clone(),
        reject_code: "INVALID_TICK".to_string(),
        reject_reason: "price must be a multiple of $0.01".to_string(),
    });
    let _ = state
        .pipeline
        .fanout_tx
        .send(FanoutCommand::to_team(team_id.to_string(), reject))
        .await;
    serde_json::to_value(OrderReply {
        order_id,
        client_order_id: body.client_order_id.clone(),
        status: OrderStatus::Rejected,
        fills: Vec::new(),
        reject_code: Some("INVALID_TICK".to_string()),
        reject_reason: Some("price must be a multiple of $0.01".to_string()),
    })
    .unwrap_or_else(|_| json!({}))
}

/// `DELETE /exchange/orders/{order_id}`: cancel an order.
///
/// `NotFound` and `NotOwner` are 200 with `cancelled: false`: the request
/// was well-formed, the exchange just had nothing to remove.
pub(super) async fn cancel_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    let team = state.bearer_team(&headers)?;
    let (request_id, rx) = state
        .correlator
        .register()
        .map_err(|_| ApiError::Overloaded)?;

    let message = IngressMessage::Cancel {
        order_id: OrderId(order_id),
        team_id: team.team_id.clone(),
        request_id: Some(request_id),
    };
    if state
        .pipeline
        .order_tx
        .send_timeout(message, state.order_queue_timeout)
        .await
        .is_err()
    {
        state.correlator.abandon(request_id);
        return Err(ApiError::Overloaded);
    }

    match state.correlator.wait(request_id, rx).await {
        Ok(PipelineReply::Cancel(reply)) => Ok(Json(
            serde_json::to_value(reply).unwrap_or_else(|_| json!({})),
        )),
        Ok(PipelineReply::Order(_)) => Err(ApiError::Timeout(request_id)),
        Err(CorrelationError::Timeout(id)) => Err(ApiError::Timeout(id)),
        Err(CorrelationError::Overloaded(_)) => Err(ApiError::Overloaded),
    }
}

/// `GET /positions`: the caller's positions per instrument.
pub(super) async fn get_positions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let team = state.bearer_team(&headers)?;
    let positions = state.pipeline.positions.positions_for(&team.team_id);
    Ok(Json(json!(positions)))
}

/// `GET /`: health plus per-stage liveness.
pub(super) async fn health(State(state): State<AppState>) -> Json<Value> {
    let stages = state.pipeline.stage_health();
    let all_alive = stages.iter().all(|s| s.alive);
    let status = if all_alive { "ok" } else { "degraded" };
    let workers: Value = stages
        .iter()
        .map(|s| {
            let liveness = if s.alive { "up" } else { "thread_down" };
            (s.name.to_string(), Value::from(liveness))
        })
        .collect::<serde_json::Map<String, Value>>()
        .into();
    let phase = *state.pipeline.phase_rx.borrow();
    Json(json!({
        "status": status,
        "phase": phase.phase.to_string(),
        "workers": workers,
        "pending_requests": state.correlator.pending_count(),
        "connected_teams": state.pipeline.connections.len(),
        "registered_teams": state.teams.len(),
    }))
}
