//! WebSocket implementation of the session transport seam.

use maira_core::{LinkError, ReconnectPolicy};
use maira_session::{ConnectTarget, Transport, TransportFactory};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::codec;
use crate::driver::{Driver, TaggedEvent};

/// Resolve the Socket.IO WebSocket endpoint for `target`.
///
/// `http(s)` maps to `ws(s)`; any existing path is kept as a prefix of
/// `/socket.io/`. Operation and element ride as query parameters.
pub fn endpoint_url(target: &ConnectTarget) -> Result<String, LinkError> {
    let raw = target.server_url.trim();
    let mut url = Url::parse(raw)
        .map_err(|e| LinkError::construction(format!("invalid server address '{raw}': {e}")))?;

    if url.host_str().is_none() {
        return Err(LinkError::construction(format!(
            "server address '{raw}' must include a host"
        )));
    }

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(LinkError::construction(format!(
                "unsupported server address scheme '{other}'; expected http(s) or ws(s)"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| LinkError::construction("failed to set websocket scheme"))?;
    url.set_fragment(None);

    let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    {
        let mut query = url.query_pairs_mut();
        let _ = query
            .clear()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket")
            .append_pair("operacion", target.operation_id.as_str());
        if !target.working_element_id.is_empty() {
            let _ = query.append_pair("elemento", target.working_element_id.as_str());
        }
    }
    Ok(url.into())
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to one driver task.
///
/// `emit` never blocks: frames go into a bounded buffer drained by the
/// driver. A full or closed buffer is reported as a send failure so the
/// session keeps the message.
#[derive(Debug)]
pub struct WsTransport {
    generation: u64,
    frames: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl WsTransport {
    pub(crate) fn new(
        generation: u64,
        frames: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generation,
            frames,
            cancel,
        }
    }

    /// Generation of the driver behind this handle.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Transport for WsTransport {
    fn emit(&mut self, event: &str, payload: &Value) -> Result<(), LinkError> {
        let frame = codec::encode_event(event, payload)?;
        self.frames.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::backpressure(event),
            TrySendError::Closed(_) => LinkError::send(event, "transport closed"),
        })
    }

    fn close(&mut self) {
        if !self.cancel.is_cancelled() {
            debug!(generation = self.generation, "closing transport");
            self.cancel.cancel();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Spawns one [`Driver`] per transport on the current tokio runtime.
#[derive(Debug)]
pub struct WsTransportFactory {
    policy: ReconnectPolicy,
    frame_capacity: usize,
    events: mpsc::Sender<TaggedEvent>,
}

impl WsTransportFactory {
    /// Factory reporting every driver's events on `events`.
    pub fn new(
        policy: ReconnectPolicy,
        frame_capacity: usize,
        events: mpsc::Sender<TaggedEvent>,
    ) -> Self {
        Self {
            policy,
            frame_capacity: frame_capacity.max(1),
            events,
        }
    }
}

impl TransportFactory for WsTransportFactory {
    fn open(
        &mut self,
        generation: u64,
        target: &ConnectTarget,
    ) -> Result<Box<dyn Transport>, LinkError> {
        let runtime = Handle::try_current()
            .map_err(|e| LinkError::construction(format!("no async runtime available: {e}")))?;
        let endpoint = endpoint_url(target)?;

        let (frames_tx, frames_rx) = mpsc::channel(self.frame_capacity);
        let cancel = CancellationToken::new();
        let driver = Driver {
            generation,
            endpoint: endpoint.clone(),
            policy: self.policy.clone(),
            outbound: frames_rx,
            events: self.events.clone(),
            cancel: cancel.clone(),
        };
        drop(runtime.spawn(driver.run()));
        info!(generation, %endpoint, "transport opened");

        Ok(Box::new(WsTransport::new(generation, frames_tx, cancel)))
    }
}
