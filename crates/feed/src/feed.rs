//! The sending side of a feed-based event system.

use crate::config::FeedConfig;
use crate::reader::Reader;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// An event feed: the source of events in a feed-based event system.
///
/// A feed hands out [`Reader`]s and fans every sent event out to each of
/// them. It only holds weak references, so it never keeps a reader alive;
/// events for readers whose handles were all dropped are simply skipped.
///
/// Sending takes `&self`, so a feed behind an `Arc` can be shared by
/// several producer threads. Subscribing takes `&mut self`.
#[derive(Debug)]
pub struct Feed<Evt>
where
    Evt: Send,
{
    readers: Vec<Weak<Reader<Evt>>>,
    prune_on_add: bool,
}

impl<Evt> Feed<Evt>
where
    Evt: Send,
{
    /// Create a feed without any readers.
    ///
    /// Use [`with_reader_capacity`](Self::with_reader_capacity) if the
    /// number of readers is known in advance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            readers: Vec::new(),
            prune_on_add: false,
        }
    }

    /// Create a feed that can track `capacity` readers without reallocating.
    #[must_use]
    pub fn with_reader_capacity(capacity: usize) -> Self {
        Self {
            readers: Vec::with_capacity(capacity),
            prune_on_add: false,
        }
    }

    /// Create a feed from configuration.
    #[must_use]
    pub fn from_config(config: &FeedConfig) -> Self {
        Self {
            readers: Vec::with_capacity(config.reader_capacity),
            prune_on_add: config.prune_on_add,
        }
    }

    /// Subscribe a new reader to the feed and return it.
    ///
    /// The returned handle can be freely sent and shared across threads.
    /// When the feed was configured with `prune_on_add`, references to
    /// dropped readers are cleared first.
    pub fn add_reader(&mut self) -> Arc<Reader<Evt>> {
        if self.prune_on_add {
            self.remove_dangling_readers();
        }
        let reader = Arc::new(Reader::new());
        self.readers.push(Arc::downgrade(&reader));
        tracing::trace!(
            target: "event_feed",
            readers = self.readers.len(),
            "Reader added"
        );
        reader
    }

    /// Send an event to each live reader, producing one with `f` per reader.
    ///
    /// `f` is not called for readers that have been dropped. If the event
    /// type is `Clone`, [`send`](Self::send) is the simpler choice.
    pub fn send_with<F>(&self, mut f: F)
    where
        F: FnMut() -> Evt,
    {
        let mut delivered = 0_usize;
        for reader in self.readers.iter().filter_map(Weak::upgrade) {
            reader.receive(f());
            delivered += 1;
        }
        tracing::trace!(
            target: "event_feed",
            delivered,
            tracked = self.readers.len(),
            "Event sent"
        );
    }

    /// Send a clone of `event` to each live reader whose queue can be
    /// locked within `timeout`. Returns how many live readers were skipped.
    ///
    /// Emits no tracing events, so it is safe to call from a tracing layer.
    #[cfg_attr(not(feature = "layer"), allow(dead_code))]
    pub(crate) fn try_send_for(&self, event: &Evt, timeout: Duration) -> usize
    where
        Evt: Clone,
    {
        self.readers
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|reader| reader.try_receive_for(event.clone(), timeout).is_err())
            .count()
    }

    /// Remove references to dropped readers.
    ///
    /// This releases the memory held for them and shortens the loop every
    /// send has to run. Surviving readers keep their relative order.
    pub fn remove_dangling_readers(&mut self) {
        let before = self.readers.len();
        self.readers.retain(|reader| reader.strong_count() > 0);
        let pruned = before - self.readers.len();
        if pruned > 0 {
            tracing::debug!(
                target: "event_feed",
                pruned,
                remaining = self.readers.len(),
                "Removed dangling readers"
            );
        }
    }

    /// Number of readers that are still alive.
    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.readers
            .iter()
            .filter(|reader| reader.strong_count() > 0)
            .count()
    }

    /// Number of reader references held, including dangling ones.
    #[must_use]
    pub fn tracked_readers(&self) -> usize {
        self.readers.len()
    }
}

impl<Evt> Feed<Evt>
where
    Evt: Send + Clone,
{
    /// Send a clone of `event` to each live reader.
    pub fn send(&self, event: Evt) {
        self.send_with(|| event.clone());
    }
}

impl<Evt> Feed<Evt>
where
    Evt: Send + Default,
{
    /// Send the event type's default value.
    ///
    /// `Default::default` is called once per live reader, even if the
    /// event type is also `Clone`.
    pub fn send_default(&self) {
        self.send_with(Default::default);
    }
}

/// The clone sends to the same readers as the original. The two are
/// independent afterwards: adding a reader to one does not affect the other.
impl<Evt> Clone for Feed<Evt>
where
    Evt: Send,
{
    fn clone(&self) -> Self {
        Self {
            readers: self.readers.clone(),
            prune_on_add: self.prune_on_add,
        }
    }
}

impl<Evt> Default for Feed<Evt>
where
    Evt: Send,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_send_without_readers() {
        let feed: Feed<u32> = Feed::new();
        feed.send(1);
        assert_eq!(feed.reader_count(), 0);
    }

    #[test]
    fn test_send_reaches_every_reader() {
        let mut feed = Feed::new();
        let a = feed.add_reader();
        let b = feed.add_reader();

        feed.send("hello");

        assert_eq!(a.read().collect::<Vec<_>>(), vec!["hello"]);
        assert_eq!(b.read().collect::<Vec<_>>(), vec!["hello"]);
    }

    #[test]
    fn test_reader_only_sees_later_events() {
        let mut feed = Feed::new();
        feed.send(1);
        let reader = feed.add_reader();
        feed.send(2);
        assert_eq!(reader.read().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_send_with_called_once_per_live_reader() {
        let mut feed = Feed::new();
        let _a = feed.add_reader();
        let b = feed.add_reader();
        let _c = feed.add_reader();
        drop(b);

        let mut calls = 0;
        feed.send_with(|| {
            calls += 1;
            calls
        });
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_send_with_produces_distinct_values() {
        let mut feed = Feed::new();
        let a = feed.add_reader();
        let b = feed.add_reader();

        let mut next = 0;
        feed.send_with(|| {
            next += 1;
            next
        });

        assert_eq!(a.read().next(), Some(1));
        assert_eq!(b.read().next(), Some(2));
    }

    #[test]
    fn test_send_default_calls_default_per_reader() {
        static DEFAULTS: AtomicUsize = AtomicUsize::new(0);

        #[derive(Clone, PartialEq, Debug)]
        struct Ping;

        impl Default for Ping {
            fn default() -> Self {
                DEFAULTS.fetch_add(1, Ordering::SeqCst);
                Self
            }
        }

        let mut feed = Feed::new();
        let a = feed.add_reader();
        let b = feed.add_reader();
        let c = feed.add_reader();

        feed.send_default();

        assert_eq!(DEFAULTS.load(Ordering::SeqCst), 3);
        for reader in [a, b, c] {
            assert_eq!(reader.read().next(), Some(Ping));
        }
    }

    #[test]
    fn test_try_send_for_skips_locked_readers() {
        let mut feed = Feed::new();
        let busy = feed.add_reader();
        let idle = feed.add_reader();
        drop(feed.add_reader());

        let held = busy.read();
        let skipped = feed.try_send_for(&5, Duration::from_millis(1));
        drop(held);

        assert_eq!(skipped, 1);
        assert!(busy.is_empty());
        assert_eq!(idle.read().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_feed_does_not_keep_reader_alive() {
        let mut feed: Feed<u32> = Feed::new();
        let reader = feed.add_reader();
        let weak = Arc::downgrade(&reader);
        drop(reader);
        assert!(weak.upgrade().is_none());
        assert_eq!(feed.reader_count(), 0);
        assert_eq!(feed.tracked_readers(), 1);
    }

    #[test]
    fn test_remove_dangling_readers() {
        let mut feed = Feed::new();
        let readers: Vec<_> = (0..6).map(|_| feed.add_reader()).collect();
        let mut kept = Vec::new();
        for (i, reader) in readers.into_iter().enumerate() {
            if i % 2 == 0 {
                kept.push(reader);
            }
        }

        assert_eq!(feed.tracked_readers(), 6);
        feed.remove_dangling_readers();
        assert_eq!(feed.tracked_readers(), 3);
        assert_eq!(feed.reader_count(), 3);

        feed.send(42);
        for reader in &kept {
            assert_eq!(reader.read().collect::<Vec<_>>(), vec![42]);
        }
    }

    #[test]
    fn test_remove_dangling_readers_all_dead() {
        let mut feed: Feed<u8> = Feed::new();
        drop(feed.add_reader());
        drop(feed.add_reader());
        feed.remove_dangling_readers();
        assert_eq!(feed.tracked_readers(), 0);
    }

    #[test]
    fn test_remove_dangling_readers_empty_feed() {
        let mut feed: Feed<u8> = Feed::new();
        feed.remove_dangling_readers();
        assert_eq!(feed.tracked_readers(), 0);
    }

    #[test]
    fn test_prune_on_add() {
        let config = FeedConfig {
            prune_on_add: true,
            ..FeedConfig::default()
        };
        let mut feed: Feed<u8> = Feed::from_config(&config);
        drop(feed.add_reader());
        drop(feed.add_reader());
        let _live = feed.add_reader();
        assert_eq!(feed.tracked_readers(), 1);
    }

    #[test]
    fn test_without_prune_on_add_references_accumulate() {
        let mut feed: Feed<u8> = Feed::new();
        drop(feed.add_reader());
        let _live = feed.add_reader();
        assert_eq!(feed.tracked_readers(), 2);
        assert_eq!(feed.reader_count(), 1);
    }

    #[test]
    fn test_from_config_reserves_capacity() {
        let config = FeedConfig {
            reader_capacity: 16,
            ..FeedConfig::default()
        };
        let feed: Feed<u8> = Feed::from_config(&config);
        assert!(feed.readers.capacity() >= 16);
    }

    #[test]
    fn test_with_reader_capacity() {
        let feed: Feed<u8> = Feed::with_reader_capacity(4);
        assert!(feed.readers.capacity() >= 4);
        assert_eq!(feed.tracked_readers(), 0);
    }

    #[test]
    fn test_clone_shares_readers_but_not_subscriptions() {
        let mut feed = Feed::new();
        let shared = feed.add_reader();
        let mut clone = feed.clone();
        let only_clone = clone.add_reader();

        feed.send(1);
        clone.send(2);

        assert_eq!(shared.read().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(only_clone.read().collect::<Vec<_>>(), vec![2]);
        assert_eq!(feed.tracked_readers(), 1);
        assert_eq!(clone.tracked_readers(), 2);
    }

    #[test]
    fn test_default_is_empty() {
        let feed: Feed<String> = Feed::default();
        assert_eq!(feed.tracked_readers(), 0);
    }

    #[test]
    fn test_feed_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Feed<String>>();
        assert_send_sync::<Reader<String>>();
        assert_send_sync::<Arc<Reader<std::cell::Cell<u8>>>>();
    }

    #[test]
    fn test_concurrent_senders() {
        let mut feed = Feed::new();
        let reader = feed.add_reader();
        let feed = Arc::new(feed);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let feed = Arc::clone(&feed);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        feed.send((t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events: Vec<(i32, i32)> = reader.read().collect();
        assert_eq!(events.len(), 400);
        for t in 0..4 {
            let per_thread: Vec<_> = events
                .iter()
                .filter(|(sender, _)| *sender == t)
                .map(|(_, i)| *i)
                .collect();
            assert_eq!(per_thread, (0..100).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_reader_on_other_thread() {
        let mut feed = Feed::new();
        let reader = feed.add_reader();
        feed.send(String::from("across"));

        let received = std::thread::spawn(move || reader.read().collect::<Vec<_>>())
            .join()
            .unwrap();
        assert_eq!(received, vec!["across".to_string()]);
    }
}
