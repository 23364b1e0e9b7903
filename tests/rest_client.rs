//! Tests of the REST client against an in-process axum backend.

#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use rover_link::domain::{Command, Speed, WireTime};
use rover_link::error::LinkError;
use rover_link::rest::RestClient;

#[derive(Debug, Clone, Default)]
struct Backend {
    posted: Arc<Mutex<Vec<Value>>>,
    healthy: bool,
}

async fn control(
    State(backend): State<Backend>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !backend.healthy {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "vehicle offline" })),
        );
    }
    let command = body.get("command").cloned().unwrap_or(Value::Null);
    if let Ok(mut posted) = backend.posted.lock() {
        posted.push(body);
    }
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": format!("sent {command}") })),
    )
}

async fn status(State(backend): State<Backend>) -> (StatusCode, Json<Value>) {
    if !backend.healthy {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "connected": true,
            "status": "moving",
            "lastCommand": "forward",
            "lastCommandTime": "2024-06-10T08:00:00Z",
            "lastUpdate": 1_718_006_400_000_i64,
            "deviceInfo": { "firmware": "1.4.2" }
        })),
    )
}

async fn clients() -> Json<Value> {
    Json(json!({ "count": 2, "clients": [{ "id": "a" }, { "id": "b" }] }))
}

async fn spawn_backend(healthy: bool) -> (RestClient, Backend) {
    let backend = Backend {
        posted: Arc::default(),
        healthy,
    };
    let app = Router::new()
        .route("/car/control", post(control))
        .route("/car/status", get(status))
        .route("/car/clients", get(clients))
        .with_state(backend.clone());

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    // The client accepts the channel's WebSocket URL as well.
    match RestClient::new(&format!("ws://{addr}/ws"), Duration::from_secs(5)) {
        Ok(client) => (client, backend),
        Err(e) => panic!("client build failed: {e}"),
    }
}

#[tokio::test]
async fn control_posts_command_and_speed() {
    let (client, backend) = spawn_backend(true).await;

    let resp = match client.send_command(Command::Backward, Speed::new(80)).await {
        Ok(resp) => resp,
        Err(e) => panic!("control failed: {e}"),
    };
    assert!(resp.success);
    assert_eq!(resp.message.as_deref(), Some("sent \"backward\""));

    let posted = match backend.posted.lock() {
        Ok(posted) => posted.clone(),
        Err(_) => panic!("poisoned"),
    };
    assert_eq!(posted, vec![json!({ "command": "backward", "speed": 80 })]);
}

#[tokio::test]
async fn status_decodes_mixed_timestamps() {
    let (client, _backend) = spawn_backend(true).await;

    let status = match client.status().await {
        Ok(status) => status,
        Err(e) => panic!("status failed: {e}"),
    };
    assert!(status.connected);
    assert_eq!(status.status, "moving");
    assert_eq!(status.last_command.as_deref(), Some("forward"));
    assert_eq!(status.last_update, Some(WireTime::EpochMillis(1_718_006_400_000)));
    let sent_at = status.last_command_time.as_ref().and_then(WireTime::to_utc);
    assert_eq!(sent_at.map(|t| t.timestamp()), Some(1_718_006_400));
    assert!(status.device_info.is_some());
}

#[tokio::test]
async fn clients_are_listed() {
    let (client, _backend) = spawn_backend(true).await;

    let list = match client.clients().await {
        Ok(list) => list,
        Err(e) => panic!("clients failed: {e}"),
    };
    assert_eq!(list.total(), 2);
    assert_eq!(list.clients.len(), 2);
}

#[tokio::test]
async fn error_status_is_reported() {
    let (client, backend) = spawn_backend(false).await;

    match client.send_command(Command::Stop, Speed::default()).await {
        Err(LinkError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert!(body.contains("vehicle offline"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(matches!(
        client.status().await,
        Err(LinkError::Status { status: 503, .. })
    ));
    assert!(backend.posted.lock().is_ok_and(|posted| posted.is_empty()));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let addr = {
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => panic!("no local addr: {e}"),
        }
    };
    let Ok(client) = RestClient::new(&format!("http://{addr}"), Duration::from_secs(2)) else {
        panic!("client build failed");
    };

    let err = match client.status().await {
        Err(e) => e,
        Ok(status) => panic!("unexpected status {status:?}"),
    };
    assert!(matches!(err, LinkError::Http(_)));
    assert!(err.is_transient());
}
