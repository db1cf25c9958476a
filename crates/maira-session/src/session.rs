//! The session object: one live transport and everything driven by it.
//!
//! A [`Session`] is a plain single-owner value. Its host (the `maira-link`
//! event loop, or a test) calls its methods and feeds it [`TransportEvent`]s
//! one at a time, so no component needs its own locking.

use chrono::Utc;
use maira_core::constants::{LOCAL_DISCONNECT_REASON, default_client_agent};
use maira_core::{LinkError, MessageCategory, ParticipantIdentity};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::announcer::SessionAnnouncer;
use crate::dispatcher::{Handler, InboundDispatcher, RegisterOutcome};
use crate::notify::{ConnectErrorThrottle, Notification, NotificationKind, Notifier};
use crate::queue::{DEFAULT_QUEUE_CAPACITY, OutboundQueue, QueuedMessage};
use crate::state::{ConnectionSnapshot, ConnectionState, StateMachine};
use crate::transport::{ConnectTarget, Transport, TransportEvent, TransportFactory};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// What [`Session::initialize`] needs to know.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Collaboration server address.
    pub server_url: String,
    /// Local participant, including operation and working element.
    pub identity: ParticipantIdentity,
    /// Client agent string sent with presence.
    pub client_agent: String,
    /// Per-category outbound queue capacity.
    pub queue_capacity: usize,
}

impl SessionConfig {
    /// Config with the default client agent and queue capacity.
    pub fn new(server_url: impl Into<String>, identity: ParticipantIdentity) -> Self {
        Self {
            server_url: server_url.into(),
            identity,
            client_agent: default_client_agent(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Override the client agent string.
    #[must_use]
    pub fn with_client_agent(mut self, client_agent: impl Into<String>) -> Self {
        self.client_agent = client_agent.into();
        self
    }

    /// Override the per-category queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Connection target derived from this config.
    #[must_use]
    pub fn target(&self) -> ConnectTarget {
        ConnectTarget {
            server_url: self.server_url.clone(),
            operation_id: self.identity.operation_id.clone(),
            working_element_id: self.identity.working_element_id.clone(),
        }
    }
}

/// Result of [`Session::send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the live transport.
    Sent,
    /// Buffered for the next connection.
    Queued,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// A realtime session with the collaboration server.
pub struct Session {
    config: Option<SessionConfig>,
    factory: Box<dyn TransportFactory>,
    transport: Option<Box<dyn Transport>>,
    generation: u64,
    machine: StateMachine,
    queue: OutboundQueue,
    dispatcher: InboundDispatcher,
    announcer: SessionAnnouncer,
    notifier: Box<dyn Notifier>,
    connect_errors: ConnectErrorThrottle,
    keepalive_active: bool,
    exhausted_notified: bool,
    backpressured: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.machine.state())
            .field("generation", &self.generation)
            .field("live", &self.transport.is_some())
            .field("queued", &self.queue.total_len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// A disconnected, uninitialized session.
    pub fn new(
        factory: impl TransportFactory + 'static,
        notifier: impl Notifier + 'static,
    ) -> Self {
        Self {
            config: None,
            factory: Box::new(factory),
            transport: None,
            generation: 0,
            machine: StateMachine::new(),
            queue: OutboundQueue::default(),
            dispatcher: InboundDispatcher::new(),
            announcer: SessionAnnouncer::new(default_client_agent()),
            notifier: Box::new(notifier),
            connect_errors: ConnectErrorThrottle::default(),
            keepalive_active: false,
            exhausted_notified: false,
            backpressured: false,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Replace the configuration wholesale and connect.
    ///
    /// Returns `false` if the transport could not be constructed; the user
    /// has already been notified in that case.
    pub fn initialize(&mut self, config: SessionConfig) -> bool {
        self.queue.set_capacity(config.queue_capacity);
        self.announcer = SessionAnnouncer::new(config.client_agent.clone());
        info!(
            server = %config.server_url,
            participant = %config.identity.id,
            operation = %config.identity.operation_id,
            element = %config.identity.working_element_id,
            "session initialized"
        );
        self.config = Some(config);
        match self.connect() {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, code = e.code(), "session initialization failed");
                false
            }
        }
    }

    /// Tear down any existing transport and open a new one.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        let Some(config) = &self.config else {
            return Err(LinkError::construction("session not initialized"));
        };
        let target = config.target();
        self.teardown();
        self.generation += 1;
        let _ = self.machine.begin_connect();
        self.connect_errors.reset();
        self.exhausted_notified = false;

        match self.factory.open(self.generation, &target) {
            Ok(transport) => {
                self.transport = Some(transport);
                info!(generation = self.generation, server = %target.server_url, "connecting");
                Ok(())
            }
            Err(e) => {
                let _ = self.machine.disconnected();
                self.notifier.notify(Notification::high(
                    NotificationKind::TransportUnavailable,
                    format!("No se pudo crear la conexión con el servidor: {e}"),
                ));
                Err(e)
            }
        }
    }

    /// Explicit local teardown. Queued messages and handlers are kept.
    pub fn disconnect(&mut self) {
        self.teardown();
        let _ = self.machine.disconnected();
        info!(generation = self.generation, "disconnected by request");
    }

    fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.keepalive_active = false;
        self.backpressured = false;
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Whether messages are currently sent immediately.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.machine.state() == ConnectionState::Connected && self.transport.is_some()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// State plus diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            state: self.machine.state(),
            last_connected_at: self.machine.last_connected_at(),
            retry_count: self.machine.retry_count(),
            connect_errors: self.connect_errors.count(),
            queued: self.queue.total_len(),
            generation: self.generation,
        }
    }

    /// Generation of the current (or last) transport.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Local participant, once initialized.
    #[must_use]
    pub fn identity(&self) -> Option<&ParticipantIdentity> {
        self.config.as_ref().map(|c| &c.identity)
    }

    /// Outbound queue, read-only.
    #[must_use]
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Handler registry, read-only.
    #[must_use]
    pub fn dispatcher(&self) -> &InboundDispatcher {
        &self.dispatcher
    }

    /// Whether queued messages are waiting only for transport buffer space.
    ///
    /// While this holds the runtime should call
    /// [`resume_drain`](Self::resume_drain) again shortly. A drain stopped by
    /// a real transmit failure waits for the next connection instead.
    #[must_use]
    pub fn has_backlog(&self) -> bool {
        self.backpressured && self.is_connected() && !self.queue.is_empty()
    }

    /// Whether periodic heartbeats should be sent.
    #[must_use]
    pub fn keepalive_active(&self) -> bool {
        self.keepalive_active
    }

    // ── Outbound ────────────────────────────────────────────────────────

    /// Send now if connected, otherwise queue.
    ///
    /// Anything already queued for `category` goes first. A failed transmit
    /// falls back to the queue; the message is never lost here.
    pub fn send(&mut self, category: MessageCategory, payload: Value) -> SendOutcome {
        if self.is_connected() {
            if let Some(transport) = self.transport.as_mut() {
                if let Err(e) = self.queue.drain_category(category, &mut |m: &QueuedMessage| {
                    transport.emit(m.category.event_name(), &m.payload)
                }) {
                    self.backpressured |= e.is_backpressure();
                }
                if self.queue.len(category) == 0 {
                    match transport.emit(category.event_name(), &payload) {
                        Ok(()) => return SendOutcome::Sent,
                        Err(e) => {
                            self.backpressured |= e.is_backpressure();
                            warn!(%category, error = %e, "send failed, message queued");
                        }
                    }
                }
            }
        }
        let _ = self.queue.enqueue(category, payload);
        debug!(%category, queued = self.queue.len(category), "message queued");
        SendOutcome::Queued
    }

    /// Continue a drain that paused on a full transport buffer.
    ///
    /// Returns how many messages went out. A no-op unless
    /// [`has_backlog`](Self::has_backlog) holds.
    pub fn resume_drain(&mut self) -> usize {
        if !self.has_backlog() {
            return 0;
        }
        let Some(transport) = self.transport.as_mut() else {
            return 0;
        };
        let report = self
            .queue
            .drain(|m| transport.emit(m.category.event_name(), &m.payload));
        self.backpressured = !report.stalled.is_empty();
        trace!(
            sent = report.sent,
            still_queued = report.remaining,
            "drain resumed"
        );
        report.sent
    }

    /// Emit one keep-alive if connected and keep-alive is active.
    pub fn heartbeat_tick(&mut self) -> bool {
        if !self.keepalive_active || !self.is_connected() {
            return false;
        }
        let (Some(transport), Some(config)) = (self.transport.as_mut(), &self.config) else {
            return false;
        };
        let payload = config.identity.heartbeat(Utc::now());
        let payload = serde_json::to_value(payload).unwrap_or(Value::Null);
        match transport.emit(maira_core::protocol::events::HEARTBEAT, &payload) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "heartbeat emit failed");
                false
            }
        }
    }

    // ── Inbound ─────────────────────────────────────────────────────────

    /// Register `handler` for `event`; deferred if no transport exists yet.
    pub fn register(&mut self, event: &str, handler: Handler) -> RegisterOutcome {
        let live = self.transport.is_some();
        self.dispatcher.register(event, handler, live)
    }

    /// Remove `handler` from `event`.
    pub fn unregister(&mut self, event: &str, handler: &Handler) -> bool {
        self.dispatcher.unregister(event, handler)
    }

    /// Apply one event from the current transport.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connect => self.on_connected(),
            TransportEvent::ConnectError(message) => self.on_connect_error(&message),
            TransportEvent::Disconnect { reason } => self.on_disconnect(&reason),
            TransportEvent::ReconnectAttempt { attempt } => {
                if self.transport.is_some() && self.machine.reconnecting(Some(attempt)) {
                    info!(attempt, "reconnect attempt");
                }
            }
            TransportEvent::Reconnect { attempt } => {
                info!(attempt, "reconnected");
            }
            TransportEvent::ReconnectError(message) => {
                warn!(error = %message, retry = self.machine.retry_count(), "reconnect attempt failed");
            }
            TransportEvent::ReconnectFailed => self.on_reconnect_failed(),
            TransportEvent::Ping(_) => self.on_ping(),
            TransportEvent::Error(message) => {
                warn!(error = %message, "transport error");
                self.notifier.notify(Notification::low(
                    NotificationKind::TransportError,
                    format!("Error de comunicación: {message}"),
                ));
            }
            TransportEvent::Message { event, payload } => {
                let _ = self.dispatcher.dispatch(&event, &payload);
            }
        }
    }

    fn on_connected(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            debug!("connect without a transport, ignoring");
            return;
        };
        if !self.machine.connected(Utc::now()) {
            return;
        }
        self.connect_errors.reset();
        self.exhausted_notified = false;

        if let Some(config) = &self.config {
            let _ = self.announcer.announce(&config.identity, &mut **transport);
        }
        let bound = self.dispatcher.flush_pending();
        let report = self
            .queue
            .drain(|m| transport.emit(m.category.event_name(), &m.payload));
        self.backpressured = !report.stalled.is_empty();
        self.keepalive_active = true;

        info!(
            generation = self.generation,
            handlers_bound = bound,
            drained = report.sent,
            still_queued = report.remaining,
            "connected"
        );
    }

    fn on_connect_error(&mut self, message: &str) {
        let notify = self.connect_errors.record();
        let count = self.connect_errors.count();
        warn!(error = %message, count, "connect error");
        if notify {
            self.notifier.notify(Notification::low(
                NotificationKind::ConnectError,
                format!("Error de conexión con el servidor (intento {count})"),
            ));
        }
    }

    fn on_disconnect(&mut self, reason: &str) {
        let state = self.machine.state();
        if reason == LOCAL_DISCONNECT_REASON
            || self.transport.is_none()
            || matches!(state, ConnectionState::Disconnected | ConnectionState::Failed)
        {
            debug!(reason, %state, "disconnect after local teardown, ignoring");
            return;
        }
        self.keepalive_active = false;
        let _ = self.machine.reconnecting(None);
        warn!(reason, "connection lost, reconnecting");
        self.notifier.notify(Notification::low(
            NotificationKind::ConnectionLost,
            "Desconectado del servidor, reconectando…",
        ));
    }

    fn on_reconnect_failed(&mut self) {
        if self.transport.is_none() {
            debug!("reconnect failure after local teardown, ignoring");
            return;
        }
        let attempts = self.machine.retry_count();
        let _ = self.machine.failed();
        self.teardown();
        error!(attempts, "reconnection abandoned");
        if !self.exhausted_notified {
            self.exhausted_notified = true;
            let e = LinkError::ReconnectExhausted { attempts };
            self.notifier.notify(
                Notification::high(
                    NotificationKind::ReconnectExhausted,
                    format!("No se pudo reconectar con el servidor ({e}). Reintente manualmente."),
                )
                .acknowledged(),
            );
        }
    }

    fn on_ping(&mut self) {
        let (Some(transport), Some(config)) = (self.transport.as_mut(), &self.config) else {
            return;
        };
        let payload = serde_json::to_value(config.identity.pong(Utc::now())).unwrap_or(Value::Null);
        if let Err(e) = transport.emit(maira_core::protocol::events::PONG, &payload) {
            debug!(error = %e, "pong emit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockFactory, RecordingNotifier};
    use assert_matches::assert_matches;
    use maira_core::{ElementId, OperationId, ParticipantId};
    use serde_json::json;

    fn config() -> SessionConfig {
        SessionConfig::new(
            "http://127.0.0.1:3000",
            ParticipantIdentity {
                id: ParticipantId::from("u-1"),
                display_name: "Cap. Ruiz".into(),
                working_element_id: ElementId::from("el-9"),
                operation_id: OperationId::from("op-7"),
            },
        )
    }

    fn session() -> (Session, MockFactory, RecordingNotifier) {
        let factory = MockFactory::new();
        let notifier = RecordingNotifier::new();
        (Session::new(factory.clone(), notifier.clone()), factory, notifier)
    }

    #[test]
    fn connect_before_initialize_fails() {
        let (mut session, factory, _) = session();
        assert_matches!(
            session.connect(),
            Err(LinkError::TransportConstruction { message }) if message.contains("not initialized")
        );
        assert!(factory.opened().is_empty());
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn initialize_opens_transport_and_enters_connecting() {
        let (mut session, factory, _) = session();
        assert!(session.initialize(config()));
        assert_eq!(session.state(), ConnectionState::Connecting);
        assert!(!session.is_connected());
        let opened = factory.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].0, 1);
        assert_eq!(opened[0].1.operation_id.as_str(), "op-7");
    }

    #[test]
    fn construction_failure_reported_not_retried() {
        let (mut session, factory, notifier) = session();
        factory.fail_construction(Some("bad address"));
        assert!(!session.initialize(config()));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        let notes = notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::TransportUnavailable);
        assert!(factory.opened().is_empty());
    }

    #[test]
    fn reconnect_tears_down_previous_transport() {
        let (mut session, factory, _) = session();
        let _ = session.initialize(config());
        session.connect().unwrap();
        let transports = factory.transports();
        assert_eq!(transports.len(), 2);
        assert!(transports[0].is_closed());
        assert!(!transports[1].is_closed());
        assert_eq!(session.generation(), 2);
    }

    #[test]
    fn connected_records_timestamp_and_starts_keepalive() {
        let (mut session, _, _) = session();
        let _ = session.initialize(config());
        assert!(!session.heartbeat_tick());
        session.handle_event(TransportEvent::Connect);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert!(snapshot.last_connected_at.is_some());
        assert!(session.keepalive_active());
        assert!(session.heartbeat_tick());
    }

    #[test]
    fn heartbeat_payload() {
        let (mut session, factory, _) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        let _ = session.heartbeat_tick();
        let beats = factory.recorder().payloads("heartbeat");
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0]["id"], "u-1");
        assert_eq!(beats[0]["usuario"], "Cap. Ruiz");
        assert_eq!(beats[0]["operacion"], "op-7");
    }

    #[test]
    fn ping_answered_with_pong() {
        let (mut session, factory, _) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        session.handle_event(TransportEvent::Ping(Value::Null));
        let pongs = factory.recorder().payloads("pong");
        assert_eq!(pongs.len(), 1);
        assert_eq!(pongs[0]["id"], "u-1");
        assert_eq!(pongs[0]["operacion"], "op-7");
        assert!(pongs[0]["timestamp"].is_string());
    }

    #[test]
    fn send_while_connected_goes_straight_out() {
        let (mut session, factory, _) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        let outcome = session.send(MessageCategory::Position, json!({"lat": 1.0}));
        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(factory.recorder().count("actualizarPosicionGB"), 1);
        assert!(session.queue().is_empty());
    }

    #[test]
    fn failed_direct_send_falls_back_to_queue() {
        let (mut session, factory, _) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        factory.recorder().fail_event("mensajeChat");
        let outcome = session.send(MessageCategory::Chat, json!({"id": "x"}));
        assert_eq!(outcome, SendOutcome::Queued);
        assert_eq!(session.queue().len(MessageCategory::Chat), 1);

        factory.recorder().heal();
        let outcome = session.send(MessageCategory::Chat, json!({"id": "y"}));
        assert_eq!(outcome, SendOutcome::Sent);
        let sent: Vec<Value> = factory
            .recorder()
            .payloads("mensajeChat")
            .iter()
            .map(|p| p["id"].clone())
            .collect();
        assert_eq!(sent, vec![json!("x"), json!("y")]);
    }

    fn chat_ids(factory: &MockFactory) -> Vec<Value> {
        factory
            .recorder()
            .payloads("mensajeChat")
            .iter()
            .map(|p| p["id"].clone())
            .collect()
    }

    #[test]
    fn backlog_larger_than_transport_buffer_drains_in_order() {
        let (mut session, factory, _) = session();
        for id in 0..30 {
            let _ = session.send(MessageCategory::Chat, json!({"id": id}));
        }
        let recorder = factory.recorder();
        recorder.limit_buffer(10);
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);

        // Seven presence and roster frames leave room for three chats.
        assert_eq!(chat_ids(&factory).len(), 3);
        assert_eq!(session.queue().len(MessageCategory::Chat), 27);
        assert!(session.has_backlog());
        assert_eq!(session.resume_drain(), 0);

        while session.has_backlog() {
            recorder.make_room(10);
            let sent = session.resume_drain();
            assert!(sent > 0 && sent <= 10);
        }
        assert!(session.queue().is_empty());
        assert_eq!(chat_ids(&factory), (0..30).map(|id| json!(id)).collect::<Vec<_>>());
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[test]
    fn send_behind_a_full_buffer_keeps_order() {
        let (mut session, factory, _) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        factory.recorder().limit_buffer(1);
        assert_eq!(session.send(MessageCategory::Chat, json!({"id": "a"})), SendOutcome::Sent);
        assert_eq!(session.send(MessageCategory::Chat, json!({"id": "b"})), SendOutcome::Queued);
        assert!(session.has_backlog());

        factory.recorder().make_room(5);
        assert_eq!(session.send(MessageCategory::Chat, json!({"id": "c"})), SendOutcome::Sent);
        assert!(!session.has_backlog());
        assert_eq!(chat_ids(&factory), vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn transmit_failure_waits_for_next_connection() {
        let (mut session, factory, _) = session();
        let _ = session.send(MessageCategory::Chat, json!({"id": "held"}));
        factory.recorder().fail_event("mensajeChat");
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        assert_eq!(session.queue().len(MessageCategory::Chat), 1);
        assert!(!session.has_backlog());
        assert_eq!(session.resume_drain(), 0);

        factory.recorder().heal();
        session.connect().unwrap();
        session.handle_event(TransportEvent::Connect);
        assert_eq!(chat_ids(&factory), vec![json!("held")]);
    }

    #[test]
    fn local_disconnect_clears_backlog_flag() {
        let (mut session, factory, _) = session();
        for id in 0..3 {
            let _ = session.send(MessageCategory::Chat, json!({"id": id}));
        }
        factory.recorder().limit_buffer(7);
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        assert!(session.has_backlog());
        session.disconnect();
        assert!(!session.has_backlog());
        assert_eq!(session.queue().len(MessageCategory::Chat), 3);
    }

    #[test]
    fn unexpected_disconnect_reconnects_and_notifies() {
        let (mut session, _, notifier) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        session.handle_event(TransportEvent::Disconnect {
            reason: "transport close".into(),
        });
        assert_eq!(session.state(), ConnectionState::Reconnecting);
        assert!(!session.keepalive_active());
        let notes = notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::ConnectionLost);
        assert_eq!(notes[0].message, "Desconectado del servidor, reconectando…");
        assert_eq!(notes[0].severity, crate::notify::Severity::Low);
    }

    #[test]
    fn reconnect_attempt_counts_and_connect_resets() {
        let (mut session, _, _) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        session.handle_event(TransportEvent::Disconnect { reason: "ping timeout".into() });
        session.handle_event(TransportEvent::ReconnectAttempt { attempt: 1 });
        session.handle_event(TransportEvent::ReconnectAttempt { attempt: 2 });
        assert_eq!(session.snapshot().retry_count, 2);
        session.handle_event(TransportEvent::Reconnect { attempt: 2 });
        session.handle_event(TransportEvent::Connect);
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.snapshot().retry_count, 0);
    }

    #[test]
    fn reconnect_failed_is_terminal_and_notified_once() {
        let (mut session, factory, notifier) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::ReconnectAttempt { attempt: 10 });
        session.handle_event(TransportEvent::ReconnectFailed);
        session.handle_event(TransportEvent::ReconnectFailed);
        assert_eq!(session.state(), ConnectionState::Failed);
        assert!(factory.transports()[0].is_closed());

        let exhausted: Vec<_> = notifier
            .notifications()
            .into_iter()
            .filter(|n| n.kind == NotificationKind::ReconnectExhausted)
            .collect();
        assert_eq!(exhausted.len(), 1);
        assert!(exhausted[0].requires_ack);
        assert_eq!(exhausted[0].severity, crate::notify::Severity::High);

        // Terminal until connect() is called again.
        session.handle_event(TransportEvent::Connect);
        assert_eq!(session.state(), ConnectionState::Failed);
        session.connect().unwrap();
        assert_eq!(session.state(), ConnectionState::Connecting);
    }

    #[test]
    fn transport_error_is_low_notification() {
        let (mut session, _, notifier) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Error("frame too large".into()));
        let notes = notifier.notifications();
        assert_eq!(notes[0].kind, NotificationKind::TransportError);
        assert_eq!(session.state(), ConnectionState::Connecting);
    }

    #[test]
    fn disconnect_keeps_queue_and_handlers() {
        let (mut session, _, _) = session();
        let _ = session.initialize(config());
        session.handle_event(TransportEvent::Connect);
        let _ = session.register("mensajeChat", Handler::new(|_| {}));
        session.disconnect();
        let _ = session.send(MessageCategory::Chat, json!({"id": "later"}));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(!session.keepalive_active());
        assert_eq!(session.queue().len(MessageCategory::Chat), 1);
        assert_eq!(session.dispatcher().bound_count("mensajeChat"), 1);
    }

    #[test]
    fn reinitialize_replaces_identity() {
        let (mut session, _, _) = session();
        let _ = session.initialize(config());
        let mut other = config();
        other.identity.display_name = "Sgto. Paz".into();
        let _ = session.initialize(other);
        assert_eq!(session.identity().unwrap().display_name, "Sgto. Paz");
        assert_eq!(session.generation(), 2);
    }
}
