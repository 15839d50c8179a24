//! Event systems built on event feeds.
//!
//! The usual way to expose events from a Rust library is callback
//! registration: users hand over a `Box<dyn FnMut(Event)>` and the library
//! invokes it. The callbacks then run on whichever thread triggered the
//! event. They must be `Send + Sync` if the library object is, they cannot
//! be postponed or rescheduled, and every registered closure costs a
//! dynamic call.
//!
//! A feed turns that around. The producer owns a [`Feed`] and *sends*
//! events into it. Each consumer owns a [`Reader`] subscribed to the feed,
//! which queues everything sent after it subscribed. Consumers process the
//! queue whenever it suits them by draining it as an iterator, usually with
//! a single `match` over the event type.
//!
//! # Architecture
//!
//! ```text
//!  producer                         consumers
//! ┌──────────────┐  send()   ┌──────────────────────┐  read()
//! │ Feed<Evt>    │──────────▶│ Arc<Reader<Evt>>     │────────▶ ReaderIter
//! │ Vec<Weak<..>>│──────────▶│ Mutex<VecDeque<Evt>> │────────▶ ReaderIter
//! └──────────────┘           └──────────────────────┘
//! ```
//!
//! - A feed only stores weak references to its readers, so it requires
//!   nothing of the event type beyond `Send` and is itself `Send + Sync`.
//! - Sending costs one queue push per reader, not one call per callback.
//! - Dropping every handle of a reader unsubscribes it;
//!   [`Feed::remove_dangling_readers`] reclaims the leftover references.
//!
//! With the default `layer` feature, [`FeedLayer`] bridges `tracing` into a
//! feed so that log events can be consumed the same way.
//!
//! # Usage
//!
//! ```rust
//! use event_feed::prelude::*;
//!
//! let mut feed = EventFeed::new();
//! let reader = feed.add_reader();
//!
//! feed.send("Hello event feed!");
//! assert_eq!(reader.read().next(), Some("Hello event feed!"));
//! assert_eq!(reader.read().next(), None);
//!
//! feed.send("first");
//! feed.send("second");
//!
//! let mut seen = Vec::new();
//! reader.read_with(|event| seen.push(event));
//! assert_eq!(seen, ["first", "second"]);
//! ```

pub mod config;
pub mod error;
mod feed;
#[cfg(feature = "layer")]
pub mod layer;
mod reader;

pub use config::{FeedConfig, LayerConfig};
pub use error::{Error, Result};
pub use feed::Feed;
#[cfg(feature = "layer")]
pub use layer::{CapturedEvent, FeedLayer};
pub use reader::{Reader, ReaderIter};

/// Re-exports renamed for glob import without name clashes.
///
/// ```rust
/// use event_feed::prelude::*;
///
/// let mut feed: EventFeed<u32> = EventFeed::new();
/// let reader: std::sync::Arc<EventReader<u32>> = feed.add_reader();
/// feed.send(7);
/// assert_eq!(reader.len(), 1);
/// ```
pub mod prelude {
    pub use crate::{Feed as EventFeed, Reader as EventReader};
}
