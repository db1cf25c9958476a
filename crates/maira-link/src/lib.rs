//! # maira-link
//!
//! Tokio binding for the MAIRA session core.
//!
//! - **Codec** ([`codec`]): Engine.IO v4 / Socket.IO v4 text packets
//! - **Driver** ([`driver`]): one task per transport generation owning the
//!   WebSocket, with capped jittered reconnects
//! - **Transport** ([`transport`]): [`WsTransport`] and its factory, plugged
//!   into [`maira_session::Session`]
//! - **Client** ([`client`]): the [`SessionClient`] actor handle, with a
//!   watch channel for connection state and a keep-alive ticker

#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod config;
pub mod driver;
pub mod heartbeat;
pub mod transport;

pub use client::SessionClient;
pub use config::LinkConfig;
pub use driver::TaggedEvent;
pub use heartbeat::HeartbeatResult;
pub use transport::{WsTransport, WsTransportFactory, endpoint_url};

pub use maira_session::{
    ConnectionSnapshot, ConnectionState, Handler, Notification, NotificationKind, RegisterOutcome,
    SendOutcome, SessionConfig, Severity,
};
