//! Session link against an in-process Socket.IO server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use maira_core::{ElementId, MessageCategory, OperationId, ParticipantId, ParticipantIdentity, ReconnectPolicy};
use maira_link::{
    ConnectionState, LinkConfig, Notification, NotificationKind, SendOutcome, SessionClient,
    SessionConfig,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(10);

// ─────────────────────────────────────────────────────────────────────────────
// Test server
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Control {
    Push(String),
    Drop,
}

struct TestServer {
    url: String,
    frames: mpsc::UnboundedReceiver<String>,
    connections: Arc<AtomicUsize>,
    control: broadcast::Sender<Control>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (control, _) = broadcast::channel(16);
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_control = control.clone();
        let accept_count = Arc::clone(&connections);
        drop(tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let n = accept_count.fetch_add(1, Ordering::SeqCst) + 1;
                drop(tokio::spawn(serve(
                    stream,
                    n,
                    frames_tx.clone(),
                    accept_control.subscribe(),
                )));
            }
        }));

        Self {
            url: format!("http://{addr}"),
            frames,
            connections,
            control,
        }
    }

    fn push(&self, frame: &str) {
        let _ = self.control.send(Control::Push(frame.to_owned())).unwrap();
    }

    fn drop_connections(&self) {
        let _ = self.control.send(Control::Drop).unwrap();
    }

    async fn next_frame(&mut self) -> String {
        timeout(WAIT, self.frames.recv()).await.unwrap().unwrap()
    }

    /// Skip frames until `raw` arrives.
    async fn expect_raw(&mut self, raw: &str) {
        loop {
            if self.next_frame().await == raw {
                return;
            }
        }
    }

    /// Skip frames until event `name` arrives; returns its payload.
    async fn expect_event(&mut self, name: &str) -> Value {
        loop {
            let frame = self.next_frame().await;
            if let Some((event, payload)) = event_of(&frame) {
                if event == name {
                    return payload;
                }
            }
        }
    }

    async fn wait_for_connections(&self, n: usize) {
        timeout(WAIT, async {
            while self.connections.load(Ordering::SeqCst) < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}

async fn serve(
    stream: TcpStream,
    n: usize,
    frames: mpsc::UnboundedSender<String>,
    mut control: broadcast::Receiver<Control>,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    let open = format!(
        r#"0{{"sid":"engine-{n}","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}}"#
    );
    if ws.send(Message::text(open)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let text = text.to_string();
                    if text == "40" {
                        let joined = format!(r#"40{{"sid":"socket-{n}"}}"#);
                        if ws.send(Message::text(joined)).await.is_err() {
                            return;
                        }
                    } else {
                        let _ = frames.send(text);
                    }
                }
                Some(Ok(_)) => {}
                _ => return,
            },
            command = control.recv() => match command {
                Ok(Control::Push(frame)) => {
                    let _ = ws.send(Message::text(frame)).await;
                }
                Ok(Control::Drop) | Err(_) => {
                    let _ = ws.close(None).await;
                    return;
                }
            },
        }
    }
}

fn event_of(frame: &str) -> Option<(String, Value)> {
    let body = frame.strip_prefix("42")?;
    let args: Vec<Value> = serde_json::from_str(body).ok()?;
    let mut args = args.into_iter();
    let name = args.next()?.as_str()?.to_owned();
    Some((name, args.next().unwrap_or(Value::Null)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn session_config(url: &str) -> SessionConfig {
    SessionConfig::new(
        url,
        ParticipantIdentity {
            id: ParticipantId::from("u-1"),
            display_name: "Cap. Ruiz".into(),
            working_element_id: ElementId::from("el-9"),
            operation_id: OperationId::from("op-7"),
        },
    )
}

fn fast_policy(attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        reconnection_attempts: attempts,
        reconnection_delay_ms: 20,
        reconnection_delay_max_ms: 100,
        timeout_ms: 2_000,
        randomization_factor: 0.0,
    }
}

async fn next_notification(
    rx: &mut mpsc::Receiver<Notification>,
    kind: NotificationKind,
) -> Notification {
    timeout(WAIT, async {
        loop {
            let notification = rx.recv().await.unwrap();
            if notification.kind == kind {
                return notification;
            }
        }
    })
    .await
    .unwrap()
}

async fn wait_connected(client: &SessionClient) {
    let _ = timeout(WAIT, client.wait_for(ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_session_lifecycle() {
    let mut server = TestServer::start().await;
    let config = LinkConfig::new(session_config(&server.url))
        .with_policy(fast_policy(5))
        .with_heartbeat_interval(Duration::from_millis(100));
    let (client, mut notifications) = SessionClient::start(&config).unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let _handler = client
        .on("mensajeChat", move |payload| sink.lock().push(payload.clone()))
        .await
        .unwrap();

    // Sent before any connection exists.
    let outcome = client
        .send(MessageCategory::Chat, json!({"id": "early", "mensaje": "hola"}))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Queued);

    assert!(client.initialize(session_config(&server.url)).await.unwrap());
    wait_connected(&client).await;

    // Presence on every channel, then roster requests, then the queued chat.
    let mut names = Vec::new();
    while names.len() < 8 {
        let frame = server.next_frame().await;
        if let Some((name, _)) = event_of(&frame) {
            if name != "heartbeat" {
                names.push(name);
            }
        }
    }
    assert_eq!(
        names,
        vec![
            "anunciarElemento",
            "nuevoElemento",
            "elementoConectado",
            "conectado",
            "solicitarElementos",
            "solicitarElementosDB",
            "listaElementos",
            "mensajeChat",
        ]
    );
    assert_eq!(client.snapshot().queued, 0);

    // Keep-alive while connected.
    let heartbeat = server.expect_event("heartbeat").await;
    assert_eq!(heartbeat["id"], "u-1");

    // Inbound events reach registered handlers.
    server.push(r#"42["mensajeChat",{"id":"srv-1","mensaje":"recibido"}]"#);
    timeout(WAIT, async {
        while received.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(received.lock()[0]["id"], "srv-1");

    // Application ping is answered with a pong event; engine ping with a pong packet.
    server.push(r#"42["ping",{}]"#);
    let pong = server.expect_event("pong").await;
    assert_eq!(pong["id"], "u-1");
    server.push("2");
    server.expect_raw("3").await;

    // Server drops the connection: the user is told and the link recovers.
    server.drop_connections();
    let lost = next_notification(&mut notifications, NotificationKind::ConnectionLost).await;
    assert!(!lost.requires_ack);
    server.wait_for_connections(2).await;
    let _ = server.expect_event("anunciarElemento").await;
    wait_connected(&client).await;

    // Sends while connected go straight out.
    let outcome = client
        .send(MessageCategory::Chat, json!({"id": "late"}))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(server.expect_event("mensajeChat").await["id"], "late");

    // Local disconnect: the server sees the namespace leave, the user is not told.
    client.disconnect().await.unwrap();
    server.expect_raw("41").await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(notification) = notifications.try_recv() {
        assert_ne!(notification.kind, NotificationKind::ConnectionLost);
    }
    assert_eq!(server.connections.load(Ordering::SeqCst), 2);

    client.shutdown().await;
}

#[tokio::test]
async fn unsupported_address_is_reported() {
    let config = LinkConfig::new(session_config("ftp://files.example"));
    let (client, mut notifications) = SessionClient::start(&config).unwrap();

    assert!(!client.initialize(session_config("ftp://files.example")).await.unwrap());
    let notification =
        next_notification(&mut notifications, NotificationKind::TransportUnavailable).await;
    assert!(notification.message.contains("ftp"));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.shutdown().await;
}

#[tokio::test]
async fn unreachable_server_exhausts_retries() {
    // Bind then release a port so nothing is listening on it.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = LinkConfig::new(session_config(&url)).with_policy(fast_policy(2));
    let (client, mut notifications) = SessionClient::start(&config).unwrap();
    let outcome = client
        .send(MessageCategory::Position, json!({"id": "p1"}))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Queued);

    assert!(client.initialize(session_config(&url)).await.unwrap());
    let first = next_notification(&mut notifications, NotificationKind::ConnectError).await;
    assert!(!first.requires_ack);
    let exhausted =
        next_notification(&mut notifications, NotificationKind::ReconnectExhausted).await;
    assert!(exhausted.requires_ack);

    let snapshot = timeout(WAIT, client.wait_for(ConnectionState::Failed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.queued, 1);

    client.shutdown().await;
}

#[tokio::test]
async fn reconnect_after_failure_delivers_queue() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = LinkConfig::new(session_config(&url)).with_policy(fast_policy(1));
    let (client, mut notifications) = SessionClient::start(&config).unwrap();
    assert!(client.initialize(session_config(&url)).await.unwrap());
    let _ = next_notification(&mut notifications, NotificationKind::ReconnectExhausted).await;
    let _ = client
        .send(MessageCategory::Chat, json!({"id": "held"}))
        .await
        .unwrap();

    // A fresh server appears; manual connect with a new address picks it up.
    let mut server = TestServer::start().await;
    assert!(client.initialize(session_config(&server.url)).await.unwrap());
    wait_connected(&client).await;
    assert_eq!(server.expect_event("mensajeChat").await["id"], "held");
    assert_eq!(client.snapshot().generation, 2);

    client.shutdown().await;
}

#[tokio::test]
async fn backlog_beyond_frame_buffer_is_fully_replayed() {
    let mut server = TestServer::start().await;
    let config = LinkConfig::new(session_config(&server.url)).with_policy(fast_policy(5));
    assert!(config.outbound_frame_capacity < 600);
    let (client, _notifications) = SessionClient::start(&config).unwrap();

    for id in 0..600 {
        let outcome = client
            .send(MessageCategory::Chat, json!({"id": id}))
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Queued);
    }

    assert!(client.initialize(session_config(&server.url)).await.unwrap());
    wait_connected(&client).await;

    for id in 0..600 {
        assert_eq!(server.expect_event("mensajeChat").await["id"], id);
    }
    let mut state = client.subscribe_state();
    let _ = timeout(WAIT, state.wait_for(|s| s.queued == 0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.state(), ConnectionState::Connected);

    client.shutdown().await;
}
