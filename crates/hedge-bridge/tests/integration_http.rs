//! End-to-end scenarios for the bridge HTTP surface, driven through the
//! router without a live listener.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use hedge_bridge::{router, BridgeConfig, BridgeState, RecordingEventSink};

fn test_app() -> (Router, Arc<BridgeState>, Arc<RecordingEventSink>) {
    test_app_with(BridgeConfig::default())
}

fn test_app_with(config: BridgeConfig) -> (Router, Arc<BridgeState>, Arc<RecordingEventSink>) {
    let sink = Arc::new(RecordingEventSink::new());
    let state = Arc::new(BridgeState::new(config, sink.clone()));
    (router(state.clone()), state, sink)
}

async fn send(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post_trade(app: &Router, body: Value) -> (StatusCode, Value) {
    send(app, "POST", "/log_trade", Some(body)).await
}

#[tokio::test]
async fn test_buy_then_sell_symmetry() {
    let (app, _state, _sink) = test_app();

    let (status, body) = post_trade(&app, json!({"action": "Buy", "quantity": 2})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, _) = post_trade(&app, json!({"action": "Sell", "quantity": 2})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["net_position"], 0);
    assert_eq!(health["hedge_size"], 0.0);
    assert_eq!(health["queue_size"], 2);
}

#[tokio::test]
async fn test_tp_passthrough_leaves_ledger() {
    let (app, state, _sink) = test_app();

    let (status, body) = post_trade(
        &app,
        json!({"action": "Buy", "quantity": 1, "order_type": "TP", "measurement_pips": 12}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["measurement_processed"], true);

    assert_eq!(state.queue().len(), 1);
    assert_eq!(state.ledger_snapshot(), (0, 0.0));

    // The record passes through the queue unmodified.
    let delivered = state.queue().pop().unwrap();
    assert_eq!(delivered.measurement_pips, 12);
}

#[tokio::test]
async fn test_queue_overflow_rejects_101st() {
    let (app, state, _sink) = test_app();

    for _ in 0..100 {
        let (status, _) = post_trade(&app, json!({"action": "Buy", "quantity": 1})).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = post_trade(&app, json!({"action": "Buy", "quantity": 1})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // The rejected record left ledger and history untouched.
    assert_eq!(state.ledger_snapshot(), (100, 100.0));
    assert_eq!(state.history_len(), 100);
    assert_eq!(state.queue().len(), 100);
}

#[tokio::test]
async fn test_malformed_intake_still_refreshes_liveness() {
    let (app, state, sink) = test_app();
    assert!(!state.upstream_connected());

    let request = Request::builder()
        .method("POST")
        .uri("/log_trade")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(state.upstream_connected());
    assert!(state.upstream_seen_elapsed().is_some());
    assert_eq!(sink.count_of("addonPingSuccess"), 1);
}

#[tokio::test]
async fn test_intake_fills_missing_time() {
    let (app, state, _sink) = test_app();
    post_trade(&app, json!({"action": "Buy", "quantity": 1})).await;

    let delivered = state.queue().pop().unwrap();
    assert!(delivered.time.is_some());
    assert!(delivered.time.unwrap().timestamp() > 0);
}

#[tokio::test]
async fn test_delivery_payload_and_sentinel() {
    let (app, _state, _sink) = test_app();

    // Empty queue: the sentinel, still JSON.
    let request = Request::builder()
        .method("GET")
        .uri("/mt5/get_trade")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "no_trade");

    // Queue a trade with instrument data and poll it back.
    post_trade(
        &app,
        json!({
            "action": "Sell",
            "quantity": 1.0,
            "id": "exec_1",
            "base_id": "base_1",
            "instrument_name": "NQ 03-25",
            "account_name": "Sim101",
            "nt_balance": 25000.0,
            "nt_trade_result": "win"
        }),
    )
    .await;

    let (status, body) = send(&app, "GET", "/mt5/get_trade", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "exec_1");
    assert_eq!(body["action"], "Sell");
    assert_eq!(body["nt_instrument_symbol"], "NQ 03-25");
    assert_eq!(body["nt_account_name"], "Sim101");
    assert_eq!(body["nt_balance"], 25000.0);
    assert_eq!(body["nt_trade_result"], "win");
    assert!(body.get("instrument_name").is_none());

    // Drained: back to the sentinel.
    let (_, body) = send(&app, "GET", "/mt5/get_trade", None).await;
    assert_eq!(body["status"], "no_trade");
}

#[tokio::test]
async fn test_health_hedgebot_ping_latches_and_emits() {
    let (app, state, sink) = test_app();

    let (status, _) = send(&app, "GET", "/health?source=hedgebot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.downstream_active());
    assert_eq!(sink.count_of("hedgebotStatusChanged"), 1);
    assert_eq!(sink.count_of("hedgebotPingSuccess"), 1);

    // Second ping: no further status change, another ping success.
    send(&app, "GET", "/health?source=hedgebot", None).await;
    assert_eq!(sink.count_of("hedgebotStatusChanged"), 1);
    assert_eq!(sink.count_of("hedgebotPingSuccess"), 2);
}

#[tokio::test]
async fn test_health_addon_and_unattributed_pings() {
    let (app, state, sink) = test_app();

    send(&app, "GET", "/health?source=addon", None).await;
    assert!(state.upstream_connected());
    assert_eq!(sink.count_of("addonPingSuccess"), 1);

    // An empty source counts as the upstream client too.
    send(&app, "GET", "/health", None).await;
    assert_eq!(sink.count_of("addonPingSuccess"), 2);

    // Unknown sources update neither peer.
    send(&app, "GET", "/health?source=mystery", None).await;
    assert_eq!(sink.count_of("addonPingSuccess"), 2);
    assert!(!state.downstream_active());
}

#[tokio::test]
async fn test_zero_position_reset_rule() {
    let (app, state, sink) = test_app();

    post_trade(&app, json!({"action": "Buy", "quantity": 3})).await;
    assert_eq!(state.ledger_snapshot(), (3, 3.0));

    // Non-zero open positions never reset.
    send(&app, "GET", "/health?source=hedgebot&open_positions=5", None).await;
    assert_eq!(state.ledger_snapshot(), (3, 3.0));
    assert_eq!(sink.count_of("positionReset"), 0);

    // Zero open positions force the ledger to zero.
    let (_, health) = send(&app, "GET", "/health?source=hedgebot&open_positions=0", None).await;
    assert_eq!(state.ledger_snapshot(), (0, 0.0));
    assert_eq!(sink.count_of("positionReset"), 1);
    assert_eq!(health["net_position"], 0);

    // Already flat: no second reset event.
    send(&app, "GET", "/health?source=hedgebot&open_positions=0", None).await;
    assert_eq!(sink.count_of("positionReset"), 1);
}

#[tokio::test]
async fn test_unparseable_open_positions_tolerated() {
    let (app, state, _sink) = test_app();
    post_trade(&app, json!({"action": "Buy", "quantity": 1})).await;

    let (status, _) =
        send(&app, "GET", "/health?source=hedgebot&open_positions=abc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.ledger_snapshot(), (1, 1.0));
}

#[tokio::test]
async fn test_upstream_closure_synthesises_queue_entry() {
    let (app, state, sink) = test_app();

    post_trade(&app, json!({"action": "Buy", "quantity": 1, "base_id": "B1"})).await;
    assert_eq!(state.ledger_snapshot(), (1, 1.0));
    // Drain the entry so the synthetic record is next.
    state.queue().pop().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/nt_close_hedge",
        Some(json!({
            "event_type": "hedge_close_notification",
            "base_id": "B1",
            "nt_instrument_symbol": "NQ 03-25",
            "nt_account_name": "Sim101",
            "closed_hedge_quantity": 1.0,
            "closed_hedge_action": "sell"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    assert_eq!(state.ledger_snapshot(), (0, 0.0));
    assert_eq!(sink.count_of("positionUpdated"), 1);

    let (_, delivered) = send(&app, "GET", "/mt5/get_trade", None).await;
    assert_eq!(delivered["action"], "CLOSE_HEDGE");
    assert_eq!(delivered["order_type"], "NT_CLOSE");
    assert_eq!(delivered["base_id"], "B1");
    assert_eq!(delivered["total_quantity"], 1);
    assert_eq!(delivered["contract_num"], 1);
    assert_eq!(delivered["nt_instrument_symbol"], "NQ 03-25");
    let id = delivered["id"].as_str().unwrap();
    assert!(id.starts_with("nt_close_B1_"), "unexpected id {}", id);
    id.trim_start_matches("nt_close_B1_")
        .parse::<i64>()
        .expect("id suffix is a unix timestamp");
}

#[tokio::test]
async fn test_upstream_closure_buytocover_covers_short() {
    let (app, state, _sink) = test_app();

    post_trade(&app, json!({"action": "Sell", "quantity": 2})).await;
    assert_eq!(state.ledger_snapshot(), (-2, -2.0));

    let (status, _) = send(
        &app,
        "POST",
        "/nt_close_hedge",
        Some(json!({
            "event_type": "hedge_close_notification",
            "base_id": "B2",
            "closed_hedge_quantity": 2.0,
            "closed_hedge_action": "buytocover"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.ledger_snapshot(), (0, 0.0));
}

#[tokio::test]
async fn test_upstream_closure_validation() {
    let (app, _state, _sink) = test_app();

    let (status, _) = send(
        &app,
        "POST",
        "/nt_close_hedge",
        Some(json!({"event_type": "wrong_event", "base_id": "B1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/nt_close_hedge",
        Some(json!({"event_type": "hedge_close_notification"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upstream_closure_queue_full() {
    let config = BridgeConfig {
        queue_capacity: 1,
        ..Default::default()
    };
    let (app, state, _sink) = test_app_with(config);

    post_trade(&app, json!({"action": "Buy", "quantity": 1})).await;
    assert_eq!(state.queue().len(), 1);

    let (status, _) = send(
        &app,
        "POST",
        "/nt_close_hedge",
        Some(json!({
            "event_type": "hedge_close_notification",
            "base_id": "B1",
            "closed_hedge_quantity": 1.0,
            "closed_hedge_action": "sell"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    // The closure's ledger delta precedes the enqueue and is not rolled
    // back by the rejection.
    assert_eq!(state.ledger_snapshot(), (0, 0.0));
}

#[tokio::test]
async fn test_trade_result_acknowledged() {
    let (app, _state, _sink) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/mt5/trade_result")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"status": "filled", "ticket": 42, "volume": 1.0, "is_close": false, "id": "exec_1"})
                .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"MT5 trade result received");

    let (status, _) = send(&app, "POST", "/mt5/trade_result", Some(json!("nonsense"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let (app, _state, _sink) = test_app();

    let (status, _) = send(&app, "GET", "/log_trade", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = send(&app, "GET", "/nt_close_hedge", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = send(&app, "POST", "/mt5/get_trade", Some(json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_intake_history_records_accepted_trades() {
    let (app, state, _sink) = test_app();

    post_trade(&app, json!({"action": "Buy", "quantity": 1, "id": "a"})).await;
    post_trade(
        &app,
        json!({"action": "Buy", "quantity": 1, "order_type": "SL", "id": "b"}),
    )
    .await;

    let history = state.trade_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, "a");
    assert_eq!(history[1].id, "b");
}
