//! Package-level constants.

/// Current version of the link client (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "maira-link";

/// Role marker carried by every presence announcement.
pub const CLIENT_ROLE: &str = "cliente";

/// Disconnect reason reported when the local side tore the transport down.
///
/// A transport-level disconnect carrying this reason is the echo of an
/// explicit `disconnect()` and must not be treated as a lost connection.
pub const LOCAL_DISCONNECT_REASON: &str = "io client disconnect";

/// Disconnect reason reported when the underlying connection dropped.
pub const TRANSPORT_CLOSE_REASON: &str = "transport close";

/// Disconnect reason reported when the server closed the namespace.
pub const SERVER_DISCONNECT_REASON: &str = "io server disconnect";

/// Default client agent string sent in presence announcements.
#[must_use]
pub fn default_client_agent() -> String {
    format!("{NAME}/{VERSION}")
}
