//! In-memory transport doubles for exercising a [`Session`](crate::Session)
//! without a network.
//!
//! Handles are cheap clones sharing state, so a test can keep one while the
//! session owns another.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use maira_core::LinkError;
use parking_lot::Mutex;
use serde_json::Value;

use crate::notify::Notification;
use crate::transport::{ConnectTarget, Transport, TransportFactory};

type FailWhen = Box<dyn Fn(&str, &Value) -> bool + Send>;

#[derive(Default)]
struct Recorder {
    emitted: Vec<(String, Value)>,
    fail_events: HashSet<String>,
    fail_when: Option<FailWhen>,
    room: Option<usize>,
}

/// A transport that records every accepted emit.
#[derive(Clone, Default)]
pub struct MockTransport {
    recorder: Arc<Mutex<Recorder>>,
    closed: Arc<AtomicBool>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("emitted", &self.recorder.lock().emitted.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl MockTransport {
    /// Empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport sharing this one's recorder but with its own closed flag.
    fn sibling(&self) -> Self {
        Self {
            recorder: Arc::clone(&self.recorder),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Every accepted emit, in order.
    #[must_use]
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.recorder.lock().emitted.clone()
    }

    /// Event names of every accepted emit, in order.
    #[must_use]
    pub fn emitted_names(&self) -> Vec<String> {
        self.recorder
            .lock()
            .emitted
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Payloads accepted for `event`, in order.
    #[must_use]
    pub fn payloads(&self, event: &str) -> Vec<Value> {
        self.recorder
            .lock()
            .emitted
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// How many emits of `event` were accepted.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.recorder
            .lock()
            .emitted
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }

    /// Forget recorded emits.
    pub fn clear(&self) {
        self.recorder.lock().emitted.clear();
    }

    /// Reject every emit of `event`.
    pub fn fail_event(&self, event: &str) {
        let _ = self.recorder.lock().fail_events.insert(event.to_owned());
    }

    /// Reject emits matching `predicate`.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&str, &Value) -> bool + Send + 'static,
    {
        self.recorder.lock().fail_when = Some(Box::new(predicate));
    }

    /// Accept only `frames` more emits, then report a full buffer until
    /// [`make_room`](Self::make_room) or [`heal`](Self::heal).
    pub fn limit_buffer(&self, frames: usize) {
        self.recorder.lock().room = Some(frames);
    }

    /// Let `frames` more emits through a limited buffer.
    pub fn make_room(&self, frames: usize) {
        let mut recorder = self.recorder.lock();
        recorder.room = Some(recorder.room.unwrap_or(0) + frames);
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        let mut recorder = self.recorder.lock();
        recorder.fail_events.clear();
        recorder.fail_when = None;
        recorder.room = None;
    }

    /// Whether `close` was called on this handle's transport.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn emit(&mut self, event: &str, payload: &Value) -> Result<(), LinkError> {
        let mut recorder = self.recorder.lock();
        let rejected = recorder.fail_events.contains(event)
            || recorder.fail_when.as_ref().is_some_and(|f| f(event, payload));
        if rejected || self.is_closed() {
            return Err(LinkError::send(event, "injected failure"));
        }
        match recorder.room {
            Some(0) => return Err(LinkError::backpressure(event)),
            Some(ref mut room) => *room -= 1,
            None => {}
        }
        recorder.emitted.push((event.to_owned(), payload.clone()));
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FactoryState {
    opened: Vec<(u64, ConnectTarget)>,
    transports: Vec<MockTransport>,
    fail_construction: Option<String>,
}

/// A factory handing out [`MockTransport`]s that share one emit recorder.
#[derive(Clone, Default)]
pub struct MockFactory {
    state: Arc<Mutex<FactoryState>>,
    template: MockTransport,
}

impl fmt::Debug for MockFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockFactory")
            .field("opened", &self.state.lock().opened.len())
            .finish_non_exhaustive()
    }
}

impl MockFactory {
    /// Factory whose transports always construct.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the shared recorder (sees emits from every transport).
    #[must_use]
    pub fn recorder(&self) -> MockTransport {
        self.template.clone()
    }

    /// Make subsequent `open` calls fail with `message` (or succeed, for `None`).
    pub fn fail_construction(&self, message: Option<&str>) {
        self.state.lock().fail_construction = message.map(str::to_owned);
    }

    /// `(generation, target)` of every successful `open`.
    #[must_use]
    pub fn opened(&self) -> Vec<(u64, ConnectTarget)> {
        self.state.lock().opened.clone()
    }

    /// Handles to every transport opened so far, oldest first.
    #[must_use]
    pub fn transports(&self) -> Vec<MockTransport> {
        self.state.lock().transports.clone()
    }
}

impl TransportFactory for MockFactory {
    fn open(
        &mut self,
        generation: u64,
        target: &ConnectTarget,
    ) -> Result<Box<dyn Transport>, LinkError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.fail_construction {
            return Err(LinkError::construction(message.clone()));
        }
        let transport = self.template.sibling();
        state.opened.push((generation, target.clone()));
        state.transports.push(transport.clone());
        Ok(Box::new(transport))
    }
}

/// A notifier that collects into a shared vector.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything notified so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    /// Forget recorded notifications.
    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

impl crate::notify::Notifier for RecordingNotifier {
    fn notify(&mut self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}
