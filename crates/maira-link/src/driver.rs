//! The per-transport connection task.
//!
//! One driver runs per transport generation. It owns the WebSocket, answers
//! Engine.IO pings, forwards outbound frames, reports lifecycle events tagged
//! with its generation and reconnects with capped, jittered backoff until the
//! attempt budget is spent or it is cancelled.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use maira_core::ReconnectPolicy;
use maira_core::constants::{LOCAL_DISCONNECT_REASON, SERVER_DISCONNECT_REASON, TRANSPORT_CLOSE_REASON};
use maira_core::protocol::events;
use maira_session::TransportEvent;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::{self, Handshake, Packet, SocketPacket};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A transport event tagged with the generation of the driver that saw it.
pub type TaggedEvent = (u64, TransportEvent);

/// Reported when the server stops pinging.
const PING_TIMEOUT_REASON: &str = "ping timeout";

/// Everything a driver needs to run.
#[derive(Debug)]
pub(crate) struct Driver {
    pub(crate) generation: u64,
    pub(crate) endpoint: String,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) outbound: mpsc::Receiver<String>,
    pub(crate) events: mpsc::Sender<TaggedEvent>,
    pub(crate) cancel: CancellationToken,
}

/// Why the pump loop ended.
#[derive(Debug, PartialEq, Eq)]
enum PumpExit {
    /// Local teardown.
    Cancelled,
    /// The connection was lost; carries the disconnect reason.
    Lost(String),
    /// Nobody is listening for events any more.
    Orphaned,
}

impl Driver {
    async fn report(&self, event: TransportEvent) -> bool {
        trace!(generation = self.generation, event = event.name(), "transport event");
        self.events.send((self.generation, event)).await.is_ok()
    }

    /// Run until cancelled, orphaned or out of attempts.
    pub(crate) async fn run(mut self) {
        let mut attempts: u32 = 0;
        loop {
            let established = tokio::select! {
                () = self.cancel.cancelled() => return,
                result = establish(&self.endpoint, self.policy.connect_timeout()) => result,
            };

            match established {
                Ok((ws, handshake)) => {
                    if attempts > 0 {
                        info!(generation = self.generation, attempts, "reconnected");
                        if !self.report(TransportEvent::Reconnect { attempt: attempts }).await {
                            return;
                        }
                    }
                    attempts = 0;
                    if !self.report(TransportEvent::Connect).await {
                        return;
                    }
                    match self.pump(ws, &handshake).await {
                        PumpExit::Cancelled => {
                            let _ = self
                                .report(TransportEvent::Disconnect {
                                    reason: LOCAL_DISCONNECT_REASON.to_owned(),
                                })
                                .await;
                            return;
                        }
                        PumpExit::Orphaned => return,
                        PumpExit::Lost(reason) => {
                            warn!(generation = self.generation, %reason, "connection lost");
                            if !self.report(TransportEvent::Disconnect { reason }).await {
                                return;
                            }
                        }
                    }
                }
                Err(message) => {
                    warn!(generation = self.generation, attempt = attempts, error = %message, "connect attempt failed");
                    if attempts > 0
                        && !self.report(TransportEvent::ReconnectError(message.clone())).await
                    {
                        return;
                    }
                    if !self.report(TransportEvent::ConnectError(message)).await {
                        return;
                    }
                }
            }

            if !self.policy.allows(attempts) {
                warn!(generation = self.generation, attempts, "reconnect budget exhausted");
                let _ = self.report(TransportEvent::ReconnectFailed).await;
                return;
            }
            attempts += 1;
            if !self.report(TransportEvent::ReconnectAttempt { attempt: attempts }).await {
                return;
            }
            let delay = self.policy.delay_for(attempts - 1, rand::random::<f64>());
            debug!(generation = self.generation, attempt = attempts, delay_ms = delay.as_millis(), "waiting before reconnect");
            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = sleep(delay) => {}
            }
        }
    }

    async fn pump(&mut self, ws: WsStream, handshake: &Handshake) -> PumpExit {
        let (mut sink, mut stream) = ws.split();
        let liveness = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
        let mut deadline = Instant::now() + liveness;

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    let _ = sink.send(Message::text(codec::DISCONNECT)).await;
                    let _ = sink.close().await;
                    return PumpExit::Cancelled;
                }

                () = sleep_until(deadline) => {
                    return PumpExit::Lost(PING_TIMEOUT_REASON.to_owned());
                }

                frame = self.outbound.recv() => {
                    let Some(frame) = frame else {
                        let _ = sink.close().await;
                        return PumpExit::Cancelled;
                    };
                    if let Err(e) = sink.send(Message::text(frame)).await {
                        return PumpExit::Lost(format!("transport error: {e}"));
                    }
                }

                message = stream.next() => {
                    deadline = Instant::now() + liveness;
                    let text = match message {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => {
                            return PumpExit::Lost(TRANSPORT_CLOSE_REASON.to_owned());
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return PumpExit::Lost(format!("transport error: {e}")),
                    };
                    let event = match codec::decode(text.as_str()) {
                        Ok(Packet::Ping(data)) => {
                            if let Err(e) = sink.send(Message::text(codec::encode_pong(&data))).await {
                                return PumpExit::Lost(format!("transport error: {e}"));
                            }
                            continue;
                        }
                        Ok(Packet::Close) => return PumpExit::Lost(TRANSPORT_CLOSE_REASON.to_owned()),
                        Ok(Packet::Message(SocketPacket::Disconnect)) => {
                            return PumpExit::Lost(SERVER_DISCONNECT_REASON.to_owned());
                        }
                        Ok(Packet::Message(SocketPacket::Event { name, payload, .. })) => {
                            if name == events::PING {
                                TransportEvent::Ping(payload)
                            } else {
                                TransportEvent::Message { event: name, payload }
                            }
                        }
                        Ok(Packet::Message(SocketPacket::ConnectError { message })) => {
                            TransportEvent::Error(message)
                        }
                        Ok(other) => {
                            debug!(generation = self.generation, packet = ?other, "ignoring packet");
                            continue;
                        }
                        Err(e) => {
                            warn!(generation = self.generation, error = %e, "undecodable frame");
                            continue;
                        }
                    };
                    if !self.report(event).await {
                        return PumpExit::Orphaned;
                    }
                }
            }
        }
    }
}

/// Open the WebSocket and complete the Engine.IO and Socket.IO handshakes.
async fn establish(endpoint: &str, limit: Duration) -> Result<(WsStream, Handshake), String> {
    let attempt = async {
        let (mut ws, _) = connect_async(endpoint)
            .await
            .map_err(|e| format!("websocket error: {e}"))?;

        let handshake = loop {
            match next_packet(&mut ws).await? {
                Packet::Open(handshake) => break handshake,
                other => return Err(format!("expected open packet, got {other:?}")),
            }
        };
        debug!(sid = %handshake.sid, ping_interval = handshake.ping_interval, "engine.io open");

        ws.send(Message::text(codec::CONNECT))
            .await
            .map_err(|e| format!("websocket error: {e}"))?;

        loop {
            match next_packet(&mut ws).await? {
                Packet::Message(SocketPacket::Connect { sid }) => {
                    debug!(sid = ?sid, "socket.io namespace joined");
                    return Ok((ws, handshake));
                }
                Packet::Message(SocketPacket::ConnectError { message }) => return Err(message),
                Packet::Ping(data) => {
                    ws.send(Message::text(codec::encode_pong(&data)))
                        .await
                        .map_err(|e| format!("websocket error: {e}"))?;
                }
                other => trace!(packet = ?other, "ignoring packet before namespace join"),
            }
        }
    };

    match timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(format!("timeout after {}ms", limit.as_millis())),
    }
}

async fn next_packet(ws: &mut WsStream) -> Result<Packet, String> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return codec::decode(text.as_str()).map_err(|e| e.to_string());
            }
            Some(Ok(Message::Close(_))) | None => return Err("closed during handshake".to_owned()),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(format!("websocket error: {e}")),
        }
    }
}
