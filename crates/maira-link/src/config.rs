//! Runtime configuration for a [`SessionClient`](crate::SessionClient).

use std::time::Duration;

use maira_core::ReconnectPolicy;
use maira_session::SessionConfig;
use maira_settings::LinkSettings;

/// Default outbound frame buffer per transport.
pub const DEFAULT_FRAME_CAPACITY: usize = 256;

/// Default keep-alive interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default notification channel capacity.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Pause before retrying a drain that stopped on a full frame buffer.
pub const DEFAULT_DRAIN_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Capacity of the command and transport-event channels feeding the actor.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Everything needed to start a client.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// Session identity, address and queue sizing.
    pub session: SessionConfig,
    /// Reconnect policy handed to every transport.
    pub policy: ReconnectPolicy,
    /// Outbound frame buffer per transport.
    pub outbound_frame_capacity: usize,
    /// Keep-alive interval.
    pub heartbeat_interval: Duration,
    /// Notification channel capacity.
    pub notification_capacity: usize,
    /// Command and event channel capacity.
    pub event_capacity: usize,
    /// Pause before retrying a drain stalled on the frame buffer.
    pub drain_retry_interval: Duration,
}

impl LinkConfig {
    /// Defaults around `session`.
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            policy: ReconnectPolicy::default(),
            outbound_frame_capacity: DEFAULT_FRAME_CAPACITY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            drain_retry_interval: DEFAULT_DRAIN_RETRY_INTERVAL,
        }
    }

    /// Build from loaded settings. A participant without an ID gets a fresh one.
    pub fn from_settings(settings: &LinkSettings) -> Self {
        let session = SessionConfig::new(settings.server.url.clone(), settings.participant.identity())
            .with_client_agent(settings.participant.client_agent.clone())
            .with_queue_capacity(settings.session.queue_capacity_per_category);
        Self {
            session,
            policy: settings.transport.policy(),
            outbound_frame_capacity: settings.transport.outbound_frame_capacity,
            heartbeat_interval: Duration::from_millis(settings.session.heartbeat_interval_ms),
            notification_capacity: settings.session.notification_capacity,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            drain_retry_interval: DEFAULT_DRAIN_RETRY_INTERVAL,
        }
    }

    /// Override the reconnect policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the outbound frame buffer per transport.
    #[must_use]
    pub fn with_frame_capacity(mut self, frames: usize) -> Self {
        self.outbound_frame_capacity = frames;
        self
    }

    /// Override the keep-alive interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}
