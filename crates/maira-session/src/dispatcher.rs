//! Inbound event dispatch.
//!
//! Handlers are bound to named events at most once per `(event, handler)`
//! pair. Registrations made while no transport exists are parked per event
//! name and bound on the next successful connection.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

/// An application callback for one inbound event.
///
/// Identity is the shared allocation: clones of the same `Handler` dedup
/// against each other, two separately created handlers never do.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(&Value) + Send + Sync>);

impl Handler {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Stable identity used for deduplication.
    #[must_use]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }

    fn call(&self, payload: &Value) {
        (self.0)(payload);
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&format_args!("{:#x}", self.id())).finish()
    }
}

/// Result of [`InboundDispatcher::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Bound to the live transport.
    Bound,
    /// No transport yet; parked until the next connection.
    Deferred,
    /// Already bound (or already parked); nothing changed.
    DuplicateIgnored,
}

/// Registry of inbound handlers.
#[derive(Debug, Default)]
pub struct InboundDispatcher {
    bound: BTreeMap<String, Vec<Handler>>,
    keys: HashSet<(String, usize)>,
    pending_by_event: BTreeMap<String, Vec<Handler>>,
}

impl InboundDispatcher {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    ///
    /// `live` says whether a transport currently exists.
    pub fn register(&mut self, event: &str, handler: Handler, live: bool) -> RegisterOutcome {
        let key = (event.to_owned(), handler.id());
        if self.keys.contains(&key) {
            trace!(event, "handler already bound");
            return RegisterOutcome::DuplicateIgnored;
        }
        if !live {
            let pending = self.pending_by_event.entry(event.to_owned()).or_default();
            if pending.iter().any(|h| h.id() == key.1) {
                return RegisterOutcome::DuplicateIgnored;
            }
            pending.push(handler);
            debug!(event, "no transport, handler registration deferred");
            return RegisterOutcome::Deferred;
        }
        let _ = self.keys.insert(key);
        self.bound.entry(event.to_owned()).or_default().push(handler);
        debug!(event, "handler bound");
        RegisterOutcome::Bound
    }

    /// Bind every parked registration, then clear the parked set.
    ///
    /// Returns how many handlers were newly bound.
    pub fn flush_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_by_event);
        let mut bound = 0;
        for (event, handlers) in pending {
            for handler in handlers {
                if self.register(&event, handler, true) == RegisterOutcome::Bound {
                    bound += 1;
                }
            }
        }
        if bound > 0 {
            debug!(bound, "deferred handler registrations applied");
        }
        bound
    }

    /// Remove `handler` from `event`, whether bound or parked.
    pub fn unregister(&mut self, event: &str, handler: &Handler) -> bool {
        let id = handler.id();
        let mut removed = self.keys.remove(&(event.to_owned(), id));
        if let Some(handlers) = self.bound.get_mut(event) {
            handlers.retain(|h| h.id() != id);
            if handlers.is_empty() {
                let _ = self.bound.remove(event);
            }
        }
        if let Some(handlers) = self.pending_by_event.get_mut(event) {
            let before = handlers.len();
            handlers.retain(|h| h.id() != id);
            removed |= handlers.len() != before;
            if handlers.is_empty() {
                let _ = self.pending_by_event.remove(event);
            }
        }
        removed
    }

    /// Invoke every handler bound to `event`, in registration order.
    ///
    /// Returns how many handlers ran.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let Some(handlers) = self.bound.get(event) else {
            trace!(event, "no handler for inbound event");
            return 0;
        };
        for handler in handlers {
            handler.call(payload);
        }
        handlers.len()
    }

    /// Handlers bound to `event`.
    #[must_use]
    pub fn bound_count(&self, event: &str) -> usize {
        self.bound.get(event).map_or(0, Vec::len)
    }

    /// Handlers parked for `event`.
    #[must_use]
    pub fn pending_count(&self, event: &str) -> usize {
        self.pending_by_event.get(event).map_or(0, Vec::len)
    }

    /// Whether any registration is parked.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending_by_event.is_empty()
    }
}
