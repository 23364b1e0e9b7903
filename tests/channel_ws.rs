//! End-to-end tests of the command channel over a real WebSocket.
//!
//! Each test runs an in-process axum backend on an ephemeral port that
//! greets every session with a status frame and acknowledges commands.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use rover_link::channel::CommandChannel;
use rover_link::config::ChannelConfig;
use rover_link::domain::{ChannelError, ChannelEvent, ChannelState, Command, EventKind, Speed};

const STATUS_FRAME: &str = r#"{"type":"car_status","data":{"connected":true,"status":"idle","lastUpdate":1718000000000}}"#;
const WAIT: Duration = Duration::from_secs(5);

/// Instructions from a test to one backend session.
#[derive(Debug)]
enum Control {
    Push(String),
    Drop,
}

#[derive(Debug, Clone)]
struct Backend {
    sessions: mpsc::UnboundedSender<mpsc::UnboundedSender<Control>>,
    received: mpsc::UnboundedSender<String>,
}

#[derive(Debug)]
struct Harness {
    addr: SocketAddr,
    sessions: mpsc::UnboundedReceiver<mpsc::UnboundedSender<Control>>,
    received: mpsc::UnboundedReceiver<String>,
}

impl Harness {
    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn next_session(&mut self) -> mpsc::UnboundedSender<Control> {
        match tokio::time::timeout(WAIT, self.sessions.recv()).await {
            Ok(Some(session)) => session,
            _ => panic!("backend saw no session"),
        }
    }

    async fn next_received(&mut self) -> serde_json::Value {
        let Ok(Some(text)) = tokio::time::timeout(WAIT, self.received.recv()).await else {
            panic!("backend received nothing");
        };
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => panic!("backend received invalid json {text}: {e}"),
        }
    }
}

async fn spawn_backend() -> Harness {
    let (sessions_tx, sessions) = mpsc::unbounded_channel();
    let (received_tx, received) = mpsc::unbounded_channel();
    let backend = Backend {
        sessions: sessions_tx,
        received: received_tx,
    };
    let app = Router::new()
        .route("/ws", get(ws_route))
        .with_state(backend);

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Harness {
        addr,
        sessions,
        received,
    }
}

async fn ws_route(ws: WebSocketUpgrade, State(backend): State<Backend>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session(socket, backend))
}

async fn session(socket: WebSocket, backend: Backend) {
    let (mut tx, mut rx) = socket.split();
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    if backend.sessions.send(control_tx).is_err() {
        return;
    }
    if tx.send(Message::text(STATUS_FRAME)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let ack = ack_for(text.as_str());
                    let _ = backend.received.send(text.as_str().to_owned());
                    if let Some(ack) = ack
                        && tx.send(Message::text(ack)).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            control = control_rx.recv() => match control {
                Some(Control::Push(frame)) => {
                    if tx.send(Message::text(frame)).await.is_err() {
                        break;
                    }
                }
                // Dropping both halves closes the TCP stream without a close frame.
                Some(Control::Drop) | None => break,
            },
        }
    }
}

fn ack_for(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let command = value.get("command")?.as_str()?;
    Some(serde_json::json!({ "type": "car_ack", "command": command, "status": "ok" }).to_string())
}

fn test_config() -> ChannelConfig {
    ChannelConfig {
        reconnect_delay: Duration::from_millis(50),
        max_reconnect_attempts: 3,
        default_speed: Speed::new(150),
    }
}

fn record(channel: &CommandChannel) -> mpsc::UnboundedReceiver<ChannelEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for kind in EventKind::ALL {
        let tx = tx.clone();
        channel.on(kind, move |event: &ChannelEvent| {
            let _ = tx.send(event.clone());
        });
    }
    rx
}

async fn wait_for<F>(events: &mut mpsc::UnboundedReceiver<ChannelEvent>, pred: F) -> ChannelEvent
where
    F: Fn(&ChannelEvent) -> bool,
{
    let found = tokio::time::timeout(WAIT, async {
        while let Some(event) = events.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await;
    match found {
        Ok(Some(event)) => event,
        _ => panic!("timed out waiting for event"),
    }
}

fn field<'a>(frame: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    frame.get(key)
}

fn is_open(event: &ChannelEvent) -> bool {
    matches!(event, ChannelEvent::Connected(true))
}

#[tokio::test]
async fn commands_and_events_round_trip() {
    let mut backend = spawn_backend().await;
    let channel = CommandChannel::new(test_config());
    let mut events = record(&channel);

    channel.connect(&backend.base_url());
    wait_for(&mut events, is_open).await;
    let _session = backend.next_session().await;
    assert!(channel.is_connected());

    let ChannelEvent::Status(status) =
        wait_for(&mut events, |e| matches!(e, ChannelEvent::Status(_))).await
    else {
        panic!("expected status");
    };
    assert!(status.connected);
    assert_eq!(status.status, "idle");

    assert!(channel.send_command(Command::Forward, Speed::new(200)));
    let frame = backend.next_received().await;
    assert_eq!(field(&frame, "command"), Some(&serde_json::json!("forward")));
    assert_eq!(field(&frame, "speed"), Some(&serde_json::json!(200)));
    assert!(frame.get("timestamp").is_some_and(serde_json::Value::is_i64));

    let ChannelEvent::Acknowledgment(ack) =
        wait_for(&mut events, |e| matches!(e, ChannelEvent::Acknowledgment(_))).await
    else {
        panic!("expected acknowledgment");
    };
    assert_eq!(ack.command, "forward");
    assert_eq!(ack.status, "ok");

    channel.disconnect();
    assert!(!channel.is_connected());
    assert_eq!(channel.state(), ChannelState::Idle);
}

#[tokio::test]
async fn pushed_frames_reach_subscribers() {
    let mut backend = spawn_backend().await;
    let channel = CommandChannel::new(test_config());
    let mut events = record(&channel);

    channel.connect(&backend.base_url());
    wait_for(&mut events, is_open).await;
    let session = backend.next_session().await;

    let pushed = [
        r#"{"type":"car_connected","device":"esp32-7","status":"online"}"#,
        r#"{"type":"telemetry","rpm":1200}"#,
        "not json",
        r#"{"type":"car_disconnected"}"#,
    ];
    for frame in pushed {
        let _ = session.send(Control::Push(frame.to_string()));
    }

    let ChannelEvent::DeviceConnected(device) =
        wait_for(&mut events, |e| matches!(e, ChannelEvent::DeviceConnected(_))).await
    else {
        panic!("expected device connection");
    };
    assert_eq!(device.device, "esp32-7");
    let next = wait_for(&mut events, |e| !matches!(e, ChannelEvent::Status(_))).await;
    assert_eq!(next, ChannelEvent::DeviceDisconnected);
    assert!(channel.is_connected());

    channel.disconnect();
}

#[tokio::test]
async fn dropped_socket_is_reestablished() {
    let mut backend = spawn_backend().await;
    let channel = CommandChannel::new(test_config());
    let mut events = record(&channel);

    channel.connect(&backend.base_url());
    wait_for(&mut events, is_open).await;
    let first = backend.next_session().await;

    let _ = first.send(Control::Drop);
    wait_for(&mut events, |e| matches!(e, ChannelEvent::Connected(false))).await;
    wait_for(&mut events, is_open).await;
    let _second = backend.next_session().await;

    assert!(channel.is_connected());
    assert_eq!(channel.reconnect_attempts(), 0);
    assert!(channel.send_default(Command::Stop));
    let frame = backend.next_received().await;
    assert_eq!(field(&frame, "command"), Some(&serde_json::json!("stop")));
    assert_eq!(field(&frame, "speed"), Some(&serde_json::json!(150)));

    channel.disconnect();
}

#[tokio::test]
async fn unreachable_backend_exhausts_budget() {
    let addr = {
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        addr
    };
    let channel = CommandChannel::new(ChannelConfig {
        reconnect_delay: Duration::from_millis(10),
        max_reconnect_attempts: 2,
        default_speed: Speed::default(),
    });
    let mut events = record(&channel);

    channel.connect(&format!("http://{addr}"));
    let terminal = wait_for(&mut events, |e| {
        matches!(e, ChannelEvent::Error(err) if err.is_terminal())
    })
    .await;

    assert_eq!(
        terminal,
        ChannelEvent::Error(ChannelError::ReconnectExhausted { attempts: 2 })
    );
    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(!channel.is_connected());
    assert!(!channel.send_command(Command::Forward, Speed::new(10)));
    assert_eq!(channel.subscriber_count(EventKind::Error), 1);
}
