//! Tracing bridge that turns tracing events into feed events.
//!
//! [`FeedLayer`] is a `tracing_subscriber` layer owning a
//! `Feed<CapturedEvent>`. Every accepted tracing event is flattened into a
//! [`CapturedEvent`] and sent to the feed's readers, which can then drain
//! them at their own pace.

use crate::config::LayerConfig;
use crate::error::Result;
use crate::feed::Feed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// Target used by the feed's own diagnostics; never captured.
const OWN_TARGET: &str = "event_feed";

/// How long delivery waits for a reader whose queue is locked.
const DELIVERY_TIMEOUT: Duration = Duration::from_millis(10);

/// A tracing event flattened into owned data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedEvent {
    /// When the layer saw the event.
    pub timestamp: DateTime<Utc>,
    /// Level name, e.g. `"INFO"`.
    pub level: String,
    /// Tracing target (module path unless overridden).
    pub target: String,
    /// The formatted message, if the event had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// All other recorded fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

impl CapturedEvent {
    /// Look up a recorded field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Render the event as a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A tracing layer that sends captured events through a [`Feed`].
///
/// Subscribe readers to the feed before handing it to the layer:
///
/// ```rust
/// use event_feed::{CapturedEvent, Feed, FeedLayer};
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let mut feed: Feed<CapturedEvent> = Feed::new();
/// let reader = feed.add_reader();
///
/// let subscriber = tracing_subscriber::registry().with(FeedLayer::new(feed));
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::info!(port = 8080, "listening");
/// });
///
/// let event = reader.read().next();
/// assert_eq!(event.and_then(|e| e.message), Some("listening".to_string()));
/// ```
///
/// # Locked readers
///
/// Logging while draining a reader on the same thread would otherwise
/// deadlock, because the open [`ReaderIter`](crate::ReaderIter) holds the
/// queue the layer wants to push into. Delivery therefore waits at most a
/// few milliseconds per reader; events a locked reader could not take are
/// dropped for that reader and counted in
/// [`dropped_events`](Self::dropped_events).
#[derive(Debug)]
pub struct FeedLayer {
    feed: Feed<CapturedEvent>,
    target_prefix: Option<String>,
    min_level: Level,
    dropped: AtomicU64,
}

impl FeedLayer {
    /// Create a layer capturing every event at every level.
    #[must_use]
    pub const fn new(feed: Feed<CapturedEvent>) -> Self {
        Self {
            feed,
            target_prefix: None,
            min_level: Level::TRACE,
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a layer filtered according to `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.min_level` is not a level name.
    pub fn from_config(feed: Feed<CapturedEvent>, config: &LayerConfig) -> Result<Self> {
        Ok(Self {
            feed,
            target_prefix: config.target_prefix.clone(),
            min_level: config.level()?,
            dropped: AtomicU64::new(0),
        })
    }

    /// Only capture events from the module path `prefix` or below it.
    ///
    /// Matching follows `::` boundaries: `"app"` accepts `"app"` and
    /// `"app::db"` but not `"apple"`.
    #[must_use]
    pub fn with_target_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_prefix = Some(prefix.into());
        self
    }

    /// Only capture events at `level` or less verbose.
    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// The feed events are sent through.
    #[must_use]
    pub const fn feed(&self) -> &Feed<CapturedEvent> {
        &self.feed
    }

    /// Number of per-reader deliveries skipped because the reader's queue
    /// stayed locked.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn accepts(&self, target: &str, level: Level) -> bool {
        if target == OWN_TARGET || level > self.min_level {
            return false;
        }
        self.target_prefix
            .as_deref()
            .is_none_or(|prefix| is_module_prefix(prefix, target))
    }

    // Must not emit tracing events: it runs inside `on_event`.
    fn deliver(&self, event: &CapturedEvent) {
        let undelivered = self.feed.try_send_for(event, DELIVERY_TIMEOUT);
        if undelivered > 0 {
            let undelivered = u64::try_from(undelivered).unwrap_or(u64::MAX);
            self.dropped.fetch_add(undelivered, Ordering::Relaxed);
        }
    }
}

fn is_module_prefix(prefix: &str, target: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

impl<S> Layer<S> for FeedLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !self.accepts(meta.target(), *meta.level()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let captured = CapturedEvent {
            timestamp: Utc::now(),
            level: meta.level().to_string(),
            target: meta.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        };
        self.deliver(&captured);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.insert(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let value = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.insert(field, Value::String(value));
        }
    }
}
