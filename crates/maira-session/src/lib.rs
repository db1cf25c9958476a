//! # maira-session
//!
//! The realtime session core, independent of any async runtime.
//!
//! A [`Session`] owns the single live transport handle and drives four
//! components from transport lifecycle events:
//!
//! - **Connection state machine** ([`state`]): `Disconnected → Connecting → Connected`,
//!   `Reconnecting`, `Failed`, with last-connected timestamp and retry count
//! - **Outbound queue** ([`queue`]): per-category FIFO buffers for messages
//!   sent while disconnected, bounded with drop-oldest eviction
//! - **Inbound dispatcher** ([`dispatcher`]): deduplicated handler bindings,
//!   deferred until a transport exists
//! - **Session announcer** ([`announcer`]): presence + roster refresh on every
//!   (re)connection
//!
//! The runtime binding (`maira-link`) implements [`Transport`] and
//! [`TransportFactory`] and feeds [`TransportEvent`]s into
//! [`Session::handle_event`] from a single event loop.

#![deny(unsafe_code)]

pub mod announcer;
pub mod dispatcher;
pub mod notify;
pub mod queue;
pub mod session;
pub mod state;
pub mod testing;
pub mod transport;

pub use announcer::{AnnounceReport, SessionAnnouncer};
pub use dispatcher::{Handler, InboundDispatcher, RegisterOutcome};
pub use notify::{LogNotifier, Notification, NotificationKind, Notifier, Severity};
pub use queue::{DrainReport, OutboundQueue, QueuedMessage};
pub use session::{SendOutcome, Session, SessionConfig};
pub use state::{ConnectionSnapshot, ConnectionState};
pub use transport::{ConnectTarget, Transport, TransportEvent, TransportFactory};
