//! Event readers and their draining iterator.

use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::iter::FusedIterator;
use std::time::Duration;

/// Receives events from a [`Feed`](crate::Feed) and queues them until they are processed.
///
/// Readers are only created through [`Feed::add_reader`](crate::Feed::add_reader),
/// which hands out an `Arc<Reader<Evt>>` that can be shared across threads.
/// The feed keeps a weak reference, so dropping every handle unsubscribes the reader.
pub struct Reader<Evt>
where
    Evt: Send,
{
    queue: Mutex<VecDeque<Evt>>,
}

impl<Evt> Reader<Evt>
where
    Evt: Send,
{
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends an event to the back of the queue.
    pub(crate) fn receive(&self, event: Evt) {
        self.queue.lock().push_back(event);
    }

    /// Appends an event unless the queue stays locked for longer than
    /// `timeout`, in which case the event is handed back.
    #[cfg_attr(not(feature = "layer"), allow(dead_code))]
    pub(crate) fn try_receive_for(&self, event: Evt, timeout: Duration) -> Result<(), Evt> {
        match self.queue.try_lock_for(timeout) {
            Some(mut queue) => {
                queue.push_back(event);
                Ok(())
            }
            None => Err(event),
        }
    }

    /// Create an iterator which removes and yields queued events, oldest first.
    ///
    /// The queue stays locked for the whole lifetime of the returned iterator,
    /// so every feed sending to this reader blocks until it is dropped. To let
    /// senders through during a long drain, drop the iterator after some
    /// events and call `read` again.
    ///
    /// # Deadlocks
    ///
    /// Sending to this reader from the thread that holds the iterator never
    /// returns: the lock is not reentrant. [`FeedLayer`](crate::FeedLayer)
    /// avoids this by giving up on a locked reader after a short wait.
    #[must_use]
    pub fn read(&self) -> ReaderIter<'_, Evt> {
        ReaderIter {
            queue: self.queue.lock(),
        }
    }

    /// Like [`read`](Self::read), but returns `None` instead of blocking
    /// when the queue is already locked by another iterator or a sender.
    #[must_use]
    pub fn try_read(&self) -> Option<ReaderIter<'_, Evt>> {
        self.queue.try_lock().map(|queue| ReaderIter { queue })
    }

    /// Drain the entire queue through `f`.
    ///
    /// Use [`read`](Self::read) directly when processing needs to produce
    /// a value or stop early.
    pub fn read_with<F>(&self, f: F)
    where
        F: FnMut(Evt),
    {
        self.read().for_each(f);
    }

    /// Number of events waiting in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if no events are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl<Evt> fmt::Debug for Reader<Evt>
where
    Evt: fmt::Debug + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("queue", &*self.queue.lock())
            .finish()
    }
}

/// Iterator draining a [`Reader`]'s queue. Acquired through [`Reader::read`].
pub struct ReaderIter<'r, Evt>
where
    Evt: Send,
{
    queue: MutexGuard<'r, VecDeque<Evt>>,
}

impl<Evt> Iterator for ReaderIter<'_, Evt>
where
    Evt: Send,
{
    type Item = Evt;

    fn next(&mut self) -> Option<Evt> {
        self.queue.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.queue.len();
        (len, Some(len))
    }

    // Consumes the iterator without popping; the events stay queued.
    fn count(self) -> usize {
        self.queue.len()
    }
}

impl<Evt> DoubleEndedIterator for ReaderIter<'_, Evt>
where
    Evt: Send,
{
    fn next_back(&mut self) -> Option<Evt> {
        self.queue.pop_back()
    }
}

impl<Evt> ExactSizeIterator for ReaderIter<'_, Evt> where Evt: Send {}

impl<Evt> FusedIterator for ReaderIter<'_, Evt> where Evt: Send {}

impl<Evt> fmt::Debug for ReaderIter<'_, Evt>
where
    Evt: fmt::Debug + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderIter")
            .field("remaining", &*self.queue)
            .finish()
    }
}
