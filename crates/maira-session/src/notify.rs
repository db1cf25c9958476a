//! User-facing notifications.
//!
//! Transport trouble never propagates into application code as an error;
//! it is turned into a [`Notification`] handed to the host's [`Notifier`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How loudly a notification should be surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational, transient (e.g. a toast).
    Low,
    /// Needs the user's attention.
    High,
}

/// What a notification is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An established connection dropped and is being retried.
    ConnectionLost,
    /// A connection attempt failed.
    ConnectError,
    /// The reconnect budget is used up; the session is `Failed`.
    ReconnectExhausted,
    /// The transport reported a generic error.
    TransportError,
    /// The transport could not be created.
    TransportUnavailable,
}

impl NotificationKind {
    /// Snake-case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionLost => "connection_lost",
            Self::ConnectError => "connect_error",
            Self::ReconnectExhausted => "reconnect_exhausted",
            Self::TransportError => "transport_error",
            Self::TransportUnavailable => "transport_unavailable",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message for the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Classification.
    pub kind: NotificationKind,
    /// How loudly to surface it.
    pub severity: Severity,
    /// Localized text.
    pub message: String,
    /// Whether the user must dismiss it explicitly.
    pub requires_ack: bool,
}

impl Notification {
    /// A transient notification.
    #[must_use]
    pub fn low(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Low,
            message: message.into(),
            requires_ack: false,
        }
    }

    /// A high-severity notification.
    #[must_use]
    pub fn high(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::High,
            message: message.into(),
            requires_ack: false,
        }
    }

    /// Mark as requiring explicit acknowledgement.
    #[must_use]
    pub fn acknowledged(mut self) -> Self {
        self.requires_ack = true;
        self
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send {
    /// Deliver one notification. Must not block.
    fn notify(&mut self, notification: Notification);
}

impl<F> Notifier for F
where
    F: FnMut(Notification) + Send,
{
    fn notify(&mut self, notification: Notification) {
        self(notification);
    }
}

/// Notifier that only logs.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, notification: Notification) {
        debug!(
            kind = %notification.kind,
            severity = ?notification.severity,
            message = %notification.message,
            "notification"
        );
    }
}

/// Decides which connect errors are worth telling the user about.
///
/// The first error of an episode is notified, then every third one.
#[derive(Clone, Debug, Default)]
pub struct ConnectErrorThrottle {
    count: u32,
}

impl ConnectErrorThrottle {
    /// Errors seen since the last reset.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Record an error; returns whether it should be notified.
    pub fn record(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count == 1 || self.count % 3 == 0
    }

    /// Forget the current episode (after a successful connection).
    pub fn reset(&mut self) {
        self.count = 0;
    }
}
