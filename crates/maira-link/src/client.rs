//! The session actor and its handle.
//!
//! A single task owns the [`Session`]. Public calls become [`Command`]s;
//! transport events arrive tagged with the generation of the driver that
//! produced them and are dropped when that generation is no longer current.
//! After every command or event the actor publishes a fresh
//! [`ConnectionSnapshot`] on a watch channel.

use std::time::Duration;

use maira_core::{LinkError, MessageCategory};
use maira_session::{
    ConnectionSnapshot, ConnectionState, Handler, Notification, RegisterOutcome, SendOutcome,
    Session, SessionConfig, TransportFactory,
};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::LinkConfig;
use crate::driver::TaggedEvent;
use crate::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::transport::WsTransportFactory;

/// How long [`SessionClient::shutdown`] waits for its tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Requests handled by the actor.
#[derive(Debug)]
pub(crate) enum Command {
    Initialize {
        config: SessionConfig,
        reply: oneshot::Sender<bool>,
    },
    Connect {
        reply: oneshot::Sender<Result<(), LinkError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        category: MessageCategory,
        payload: Value,
        reply: oneshot::Sender<SendOutcome>,
    },
    Register {
        event: String,
        handler: Handler,
        reply: oneshot::Sender<RegisterOutcome>,
    },
    Unregister {
        event: String,
        handler: Handler,
        reply: oneshot::Sender<bool>,
    },
    Heartbeat,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a running session.
#[derive(Debug)]
pub struct SessionClient {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionSnapshot>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionClient {
    /// Spawn the actor and heartbeat on the current runtime.
    ///
    /// The session starts uninitialized; call [`initialize`](Self::initialize)
    /// to connect. Notifications for the user arrive on the returned receiver.
    pub fn start(config: &LinkConfig) -> Result<(Self, mpsc::Receiver<Notification>), LinkError> {
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        let factory = WsTransportFactory::new(
            config.policy.clone(),
            config.outbound_frame_capacity,
            events_tx,
        );
        Self::spawn(config, factory, events_rx)
    }

    pub(crate) fn spawn(
        config: &LinkConfig,
        factory: impl TransportFactory + 'static,
        events: mpsc::Receiver<TaggedEvent>,
    ) -> Result<(Self, mpsc::Receiver<Notification>), LinkError> {
        let runtime = Handle::try_current()
            .map_err(|e| LinkError::construction(format!("no async runtime available: {e}")))?;

        let (notify_tx, notify_rx) = mpsc::channel(config.notification_capacity.max(1));
        let notifier = move |notification: Notification| {
            debug!(kind = %notification.kind, "user notification");
            if let Err(e) = notify_tx.try_send(notification) {
                warn!(error = %e, "notification dropped");
            }
        };
        let session = Session::new(factory, notifier);

        let (commands_tx, commands_rx) = mpsc::channel(config.event_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(session.snapshot());
        let cancel = CancellationToken::new();

        let actor = Actor {
            session,
            commands: commands_rx,
            events,
            state: state_tx,
            cancel: cancel.clone(),
            drain_retry: drain_retry_ticker(config.drain_retry_interval),
        };
        let actor_task = runtime.spawn(actor.run());

        let heartbeat_commands = commands_tx.clone();
        let heartbeat_interval = config.heartbeat_interval;
        let heartbeat_cancel = cancel.clone();
        let heartbeat_task = runtime.spawn(async move {
            let result =
                run_heartbeat(heartbeat_commands, heartbeat_interval, heartbeat_cancel).await;
            if result == HeartbeatResult::ClientGone {
                debug!("heartbeat stopped, session actor gone");
            }
        });

        Ok((
            Self {
                commands: commands_tx,
                state: state_rx,
                cancel,
                tasks: vec![actor_task, heartbeat_task],
            },
            notify_rx,
        ))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, LinkError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| LinkError::Closed)?;
        response.await.map_err(|_| LinkError::Closed)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Replace the configuration and connect.
    ///
    /// `Ok(false)` means the transport could not be constructed; a
    /// notification has been raised.
    pub async fn initialize(&self, config: SessionConfig) -> Result<bool, LinkError> {
        self.request(|reply| Command::Initialize { config, reply })
            .await
    }

    /// Tear down the current transport and open a new one.
    pub async fn connect(&self) -> Result<(), LinkError> {
        self.request(|reply| Command::Connect { reply }).await?
    }

    /// Close the transport. Queue and handlers survive.
    pub async fn disconnect(&self) -> Result<(), LinkError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    // ── Messaging ───────────────────────────────────────────────────────

    /// Send now if connected, otherwise queue for the next connection.
    pub async fn send(
        &self,
        category: MessageCategory,
        payload: Value,
    ) -> Result<SendOutcome, LinkError> {
        self.request(|reply| Command::Send {
            category,
            payload,
            reply,
        })
        .await
    }

    /// Register `handler` for inbound `event`.
    pub async fn register(
        &self,
        event: &str,
        handler: Handler,
    ) -> Result<RegisterOutcome, LinkError> {
        self.request(|reply| Command::Register {
            event: event.to_owned(),
            handler,
            reply,
        })
        .await
    }

    /// Register a closure; the returned [`Handler`] unregisters it later.
    pub async fn on<F>(&self, event: &str, f: F) -> Result<Handler, LinkError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let handler = Handler::new(f);
        let _ = self.register(event, handler.clone()).await?;
        Ok(handler)
    }

    /// Remove `handler` from `event`.
    pub async fn unregister(&self, event: &str, handler: &Handler) -> Result<bool, LinkError> {
        self.request(|reply| Command::Unregister {
            event: event.to_owned(),
            handler: handler.clone(),
            reply,
        })
        .await
    }

    // ── State ───────────────────────────────────────────────────────────

    /// Whether messages are currently sent immediately.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.borrow().state == ConnectionState::Connected
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().state
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.state.clone()
    }

    /// Wait until the session reaches `state`.
    pub async fn wait_for(&self, state: ConnectionState) -> Result<ConnectionSnapshot, LinkError> {
        let mut rx = self.state.clone();
        let snapshot = rx
            .wait_for(|s| s.state == state)
            .await
            .map_err(|_| LinkError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Disconnect, stop the tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut self.tasks);
        info!(task_count = tasks.len(), "shutting down session link");
        let drain = futures::future::join_all(tasks);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
            warn!("shutdown timed out after {SHUTDOWN_TIMEOUT:?}, some tasks may still be running");
        }
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────────────────────────

struct Actor {
    session: Session,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Receiver<TaggedEvent>,
    state: watch::Sender<ConnectionSnapshot>,
    cancel: CancellationToken,
    drain_retry: Interval,
}

/// Ticks only matter while a drain is stalled; missed ticks are not replayed.
fn drain_retry_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl Actor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                Some((generation, event)) = self.events.recv() => {
                    if generation == self.session.generation() {
                        self.session.handle_event(event);
                        self.publish();
                    } else {
                        trace!(generation, current = self.session.generation(), event = event.name(), "stale transport event dropped");
                    }
                }

                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    self.apply(command);
                }

                _ = self.drain_retry.tick(), if self.session.has_backlog() => {
                    if self.session.resume_drain() > 0 {
                        self.publish();
                    }
                }
            }
        }

        self.session.disconnect();
        self.publish();
        debug!("session actor stopped");
    }

    fn publish(&self) {
        let _ = self.state.send_replace(self.session.snapshot());
    }

    /// Publish the new snapshot, then answer, so callers observe their own effect.
    fn reply<T>(&self, reply: oneshot::Sender<T>, value: T) {
        self.publish();
        let _ = reply.send(value);
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Initialize { config, reply } => {
                let ok = self.session.initialize(config);
                self.reply(reply, ok);
            }
            Command::Connect { reply } => {
                let result = self.session.connect();
                self.reply(reply, result);
            }
            Command::Disconnect { reply } => {
                self.session.disconnect();
                self.reply(reply, ());
            }
            Command::Send {
                category,
                payload,
                reply,
            } => {
                let outcome = self.session.send(category, payload);
                self.reply(reply, outcome);
            }
            Command::Register {
                event,
                handler,
                reply,
            } => {
                let outcome = self.session.register(&event, handler);
                self.reply(reply, outcome);
            }
            Command::Unregister {
                event,
                handler,
                reply,
            } => {
                let removed = self.session.unregister(&event, &handler);
                self.reply(reply, removed);
            }
            Command::Heartbeat => {
                if self.session.heartbeat_tick() {
                    trace!("heartbeat sent");
                }
            }
        }
    }
}
