//! Request handlers for the bridge HTTP surface.
//!
//! Handlers parse request bytes themselves instead of using the JSON
//! extractor: the intake path must refresh upstream liveness before any
//! validation can fail, and the closure path must keep the original bytes
//! to forward them verbatim. Errors are recovered here and converted to
//! HTTP statuses; nothing propagates past the handler boundary.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::events::UiEvent;
use crate::state::BridgeState;
use crate::types::{
    HedgeCloseNotification, Mt5TradeResult, Trade, TradeDelivery,
};

/// Longest base_id accepted as-is; anything longer is assumed to be a
/// corrupted GUID and truncated to GUID length.
const MAX_BASE_ID_LEN: usize = 50;
const GUID_LEN: usize = 36;

/// JSON error body returned by every failing handler.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiError {
            error: error.to_string(),
            message: message.into(),
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct IntakeResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    measurement_processed: Option<bool>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    queue_size: usize,
    net_position: i64,
    hedge_size: f64,
}

#[derive(Debug, Serialize)]
struct ForwardedResponse {
    status: &'static str,
    message: &'static str,
    base_id: String,
    nt_status: String,
}

#[derive(Debug, Serialize)]
struct QueuedClosureResponse {
    status: &'static str,
    message: &'static str,
}

/// POST /log_trade: upstream trade ingest.
pub async fn log_trade(State(state): State<Arc<BridgeState>>, body: Bytes) -> Response {
    // Liveness first: even a malformed payload proves the upstream client
    // is talking to us.
    state.mark_upstream_seen();
    state.emit(UiEvent::AddonPingSuccess);

    let mut trade: Trade = match serde_json::from_slice(&body) {
        Ok(trade) => trade,
        Err(e) => {
            warn!(error = %e, "failed to decode trade payload");
            return error_response(StatusCode::BAD_REQUEST, "invalid_json", e.to_string());
        }
    };
    trade.fill_missing_time(Utc::now());

    info!(
        id = %trade.id,
        base_id = %trade.base_id,
        action = %trade.action,
        quantity = trade.quantity,
        contract_num = trade.contract_num,
        total_quantity = trade.total_quantity,
        price = trade.price,
        "trade received"
    );

    if trade.order_type.is_measurement() {
        debug!(
            order_type = %trade.order_type,
            raw = trade.raw_measurement,
            pips = trade.measurement_pips,
            "measurement record, ledger untouched"
        );
        return match state.queue().push(trade.clone()) {
            Ok(()) => {
                state.push_history(trade);
                Json(IntakeResponse {
                    status: "success",
                    measurement_processed: Some(true),
                })
                .into_response()
            }
            Err(e) => {
                warn!(error = %e, "measurement rejected, queue full");
                error_response(StatusCode::SERVICE_UNAVAILABLE, "queue_full", e.to_string())
            }
        };
    }

    match state.queue().push(trade.clone()) {
        Ok(()) => {
            state.push_history(trade.clone());
            if let Some((net, hedge)) = state.apply_trade(&trade) {
                info!(net_position = net, hedge_size = hedge, "net position updated");
            }
            debug!(queue_size = state.queue().len(), "trade queued");
            Json(IntakeResponse {
                status: "success",
                measurement_processed: None,
            })
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "trade rejected, queue full");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "queue_full", e.to_string())
        }
    }
}

/// GET /mt5/get_trade: downstream poll for the next order.
pub async fn get_trade(State(state): State<Arc<BridgeState>>) -> Response {
    match state.queue().pop() {
        Some(trade) => {
            info!(
                id = %trade.id,
                base_id = %trade.base_id,
                action = %trade.action,
                quantity = trade.quantity,
                "delivering trade downstream"
            );
            Json(TradeDelivery::from(&trade)).into_response()
        }
        None => Json(serde_json::json!({ "status": "no_trade" })).into_response(),
    }
}

/// GET /health: liveness ping plus state snapshot.
pub async fn health(
    State(state): State<Arc<BridgeState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let source = params.get("source").map(String::as_str).unwrap_or("");

    match source {
        "hedgebot" => {
            if state.mark_downstream_ping() {
                state.emit(UiEvent::HedgebotStatusChanged { active: true });
            }
            state.emit(UiEvent::HedgebotPingSuccess);

            if let Some(raw) = params.get("open_positions") {
                match raw.parse::<i64>() {
                    Ok(0) => {
                        if state.reset_if_position_held() {
                            state.emit(UiEvent::PositionReset {
                                net_position: 0,
                                hedge_size: 0.0,
                            });
                        }
                    }
                    Ok(_) => {
                        // Non-zero counts never trigger a reset; the ledger
                        // tracks individual trade events.
                    }
                    Err(e) => {
                        warn!(open_positions = %raw, error = %e, "unparseable open_positions");
                    }
                }
            }
        }
        "addon" | "" => {
            state.mark_upstream_seen();
            state.emit(UiEvent::AddonPingSuccess);
        }
        other => {
            debug!(source = %other, "health ping from unknown source");
        }
    }

    let (net_position, hedge_size) = state.ledger_snapshot();
    let queue_size = state.queue().len();
    debug!(source, queue_size, net_position, hedge_size, "health check");

    Json(HealthResponse {
        status: "healthy",
        queue_size,
        net_position,
        hedge_size,
    })
    .into_response()
}

/// POST /notify_hedge_close: downstream closure confirmation, forwarded
/// upstream with retry.
pub async fn notify_hedge_close(State(state): State<Arc<BridgeState>>, body: Bytes) -> Response {
    // Parse a copy for validation; the original bytes forward verbatim.
    let mut notification: HedgeCloseNotification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "failed to decode closure notification");
            return error_response(StatusCode::BAD_REQUEST, "invalid_json", e.to_string());
        }
    };
    if let Err(e) = notification.validate() {
        warn!(error = %e, "closure notification rejected");
        return error_response(StatusCode::BAD_REQUEST, "invalid_notification", e.to_string());
    }
    sanitize_base_id(&mut notification);

    info!(
        base_id = %notification.base_id,
        quantity = notification.closed_hedge_quantity,
        action = ?notification.closed_hedge_action,
        "downstream hedge closure received"
    );

    // A downstream closure confirms a change the upstream client already
    // initiated; the net position stays put and only the derived hedge
    // size is re-asserted.
    let (net_position, hedge_size) = state.reconcile_hedge_size();
    state.emit(UiEvent::PositionUpdated {
        net_position,
        hedge_size,
    });

    match state.upstream_client().forward_closure(body).await {
        Ok(receipt) => {
            if serde_json::from_slice::<serde_json::Value>(&receipt.body).is_err() {
                warn!(
                    base_id = %notification.base_id,
                    "upstream acknowledgement is not valid JSON"
                );
            }
            Json(ForwardedResponse {
                status: "success",
                message: "hedge closure notification processed and forwarded",
                base_id: notification.base_id,
                nt_status: receipt.status.to_string(),
            })
            .into_response()
        }
        Err(e) => {
            error!(base_id = %notification.base_id, error = %e, "closure forward failed");
            error_response(StatusCode::BAD_GATEWAY, "forward_failed", e.to_string())
        }
    }
}

/// POST /nt_close_hedge: upstream closure request, turned into a ledger
/// delta and a synthetic queue entry for the downstream executor.
pub async fn nt_close_hedge(State(state): State<Arc<BridgeState>>, body: Bytes) -> Response {
    let notification: HedgeCloseNotification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "failed to decode upstream closure request");
            return error_response(StatusCode::BAD_REQUEST, "invalid_json", e.to_string());
        }
    };
    if let Err(e) = notification.validate() {
        warn!(error = %e, "upstream closure request rejected");
        return error_response(StatusCode::BAD_REQUEST, "invalid_notification", e.to_string());
    }

    info!(
        base_id = %notification.base_id,
        quantity = notification.closed_hedge_quantity,
        action = ?notification.closed_hedge_action,
        reason = %notification.closure_reason,
        "upstream hedge closure requested"
    );

    // The upstream closure is the cause of the position change and
    // carries signed intent, unlike the downstream confirmation path.
    let (net_position, hedge_size) = match notification.closed_hedge_action {
        Some(action) => {
            state.apply_position_delta(action.signed(notification.floored_quantity()))
        }
        None => state.ledger_snapshot(),
    };
    state.emit(UiEvent::PositionUpdated {
        net_position,
        hedge_size,
    });

    let closure = Trade::synthetic_closure(&notification, Utc::now());
    match state.queue().push(closure) {
        Ok(()) => {
            info!(
                base_id = %notification.base_id,
                queue_size = state.queue().len(),
                "closure request queued for downstream executor"
            );
            Json(QueuedClosureResponse {
                status: "success",
                message: "closure request queued for downstream executor",
            })
            .into_response()
        }
        Err(e) => {
            warn!(base_id = %notification.base_id, error = %e, "closure request rejected, queue full");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "queue_full", e.to_string())
        }
    }
}

/// POST /mt5/trade_result: downstream execution acknowledgement.
pub async fn trade_result(body: Bytes) -> Response {
    let result: Mt5TradeResult = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "failed to decode trade result");
            return error_response(StatusCode::BAD_REQUEST, "invalid_json", e.to_string());
        }
    };

    info!(
        status = %result.status,
        ticket = result.ticket,
        volume = result.volume,
        is_close = result.is_close,
        id = %result.id,
        "downstream trade result received"
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "MT5 trade result received",
    )
        .into_response()
}

/// Repair over-long base IDs: anything past the expected GUID length is
/// assumed to be corruption appended by the sender and cut off. The raw
/// request bytes are unaffected.
fn sanitize_base_id(notification: &mut HedgeCloseNotification) {
    if notification.base_id.len() > MAX_BASE_ID_LEN {
        let original = notification.base_id.clone();
        notification.base_id = notification.base_id.chars().take(GUID_LEN).collect();
        warn!(
            original = %original,
            original_len = original.len(),
            repaired = %notification.base_id,
            "base_id exceeds expected GUID length, truncated"
        );
    }
}
