//! In-memory log recording for tests.
//!
//! [`capture_logs`] installs a thread-local subscriber and hands back a
//! [`CapturedLogs`] handle. Session tests use it to check that dropped
//! messages and rejected frames were reported without scraping stderr.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded log line.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Severity.
    pub level: Level,
    /// Emitting module path.
    pub target: String,
    /// The `message` field, empty for field-only events.
    pub message: String,
    /// Remaining structured fields, rendered as text.
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// Rendered value of a structured field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn mentions(&self, text: &str) -> bool {
        self.message.contains(text)
    }
}

/// Shared handle onto recorded events.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    inner: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    fn with<R>(&self, f: impl FnOnce(&mut Vec<CapturedEvent>) -> R) -> R {
        let mut events = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut events)
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.with(|events| events.clone())
    }

    /// Events whose message contains `text`, oldest first.
    pub fn matching(&self, text: &str) -> Vec<CapturedEvent> {
        self.with(|events| events.iter().filter(|e| e.mentions(text)).cloned().collect())
    }

    /// Whether any event mentions `text`.
    pub fn has_message(&self, text: &str) -> bool {
        self.with(|events| events.iter().any(|e| e.mentions(text)))
    }

    /// Whether an event at exactly `level` mentions `text`.
    pub fn has_event(&self, level: Level, text: &str) -> bool {
        self.with(|events| events.iter().any(|e| e.level == level && e.mentions(text)))
    }

    /// Number of events at exactly `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.with(|events| events.iter().filter(|e| e.level == level).count())
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.with(Vec::clear);
    }
}

#[derive(Default)]
struct Collector {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Collector {
    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            let _ = self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for Collector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

struct Recorder(CapturedLogs);

impl<S: Subscriber> Layer<S> for Recorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut collector = Collector::default();
        event.record(&mut collector);
        let meta = event.metadata();
        let captured = CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: collector.message,
            fields: collector.fields,
        };
        self.0.with(|events| events.push(captured));
    }
}

/// Record every event on the current thread until the guard drops.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(Recorder(logs.clone()))
        .set_default();
    (logs, guard)
}
