//! Cross-path message queue.
//!
//! A mutex-guarded FIFO that moves entries between the data-path thread and the
//! control-channel thread. Entries are moved in and moved out; the queue never
//! hands out references to what it holds.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::flow::FlowEntry;

/// A message crossing between the data path and the control channel.
///
/// Deliberately not `Clone`: an entry has exactly one owner at a time.
#[derive(Debug)]
pub struct QueueEntry {
    /// Flow entry the message concerns, if any.
    pub flow_entry: Option<Arc<FlowEntry>>,
    pub payload: Vec<u8>,
}

impl QueueEntry {
    /// An entry with no flow attached.
    pub fn new(payload: Vec<u8>) -> QueueEntry {
        QueueEntry {
            flow_entry: None,
            payload: payload,
        }
    }

    /// An entry about `flow_entry`.
    pub fn for_flow(flow_entry: Arc<FlowEntry>, payload: Vec<u8>) -> QueueEntry {
        QueueEntry {
            flow_entry: Some(flow_entry),
            payload: payload,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Returned by `enqueue` on a bounded queue that is full. Carries the rejected entry.
#[derive(Error)]
#[error("cross-path queue is full")]
pub struct QueueFull<T>(pub T);

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

/// FIFO shared by any number of producers and a single draining consumer.
pub struct CrossPathQueue<T> {
    entries: Mutex<VecDeque<T>>,
    capacity: Option<usize>,
}

impl<T> CrossPathQueue<T> {
    /// A queue with no bound on its length.
    pub fn unbounded() -> CrossPathQueue<T> {
        CrossPathQueue {
            entries: Mutex::new(VecDeque::new()),
            capacity: None,
        }
    }

    /// A queue holding at most `capacity` entries; further entries are refused.
    pub fn bounded(capacity: usize) -> CrossPathQueue<T> {
        CrossPathQueue {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Bounded when `capacity` is `Some`, unbounded otherwise.
    pub fn with_capacity(capacity: Option<usize>) -> CrossPathQueue<T> {
        match capacity {
            Some(n) => Self::bounded(n),
            None => Self::unbounded(),
        }
    }

    /// Append `entry` at the tail.
    pub fn enqueue(&self, entry: T) -> Result<(), QueueFull<T>> {
        let mut entries = self.entries.lock();
        if let Some(cap) = self.capacity {
            if entries.len() >= cap {
                return Err(QueueFull(entry));
            }
        }
        entries.push_back(entry);
        Ok(())
    }

    /// Remove and return every queued entry, oldest first.
    ///
    /// The lock is held only for the swap; the returned entries are processed
    /// without blocking producers.
    pub fn dequeue_all(&self) -> Vec<T> {
        let taken = mem::take(&mut *self.entries.lock());
        Vec::from(taken)
    }

    /// Number of entries waiting.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<T> Default for CrossPathQueue<T> {
    fn default() -> CrossPathQueue<T> {
        CrossPathQueue::unbounded()
    }
}
