//! The two cross-path queues joining the data path and the control channel.

use std::sync::Arc;

use tracing::warn;

use crate::error::{OfpError, Result};
use crate::ofp_event::{EventSource, Events};
use crate::ofp_queue::{CrossPathQueue, QueueEntry, QueueFull};

/// Data path -> control channel and control channel -> data path queues, each
/// paired with the event source of the loop that consumes it.
pub struct PathBridge {
    to_control: CrossPathQueue<QueueEntry>,
    to_datapath: CrossPathQueue<QueueEntry>,
    control_events: Arc<EventSource>,
    datapath_events: Arc<EventSource>,
}

impl PathBridge {
    /// Both queues share `capacity`; `None` leaves them unbounded.
    pub fn new(capacity: Option<usize>) -> PathBridge {
        PathBridge {
            to_control: CrossPathQueue::with_capacity(capacity),
            to_datapath: CrossPathQueue::with_capacity(capacity),
            control_events: Arc::new(EventSource::new()),
            datapath_events: Arc::new(EventSource::new()),
        }
    }

    /// Event source the control-channel loop waits on.
    pub fn control_events(&self) -> &Arc<EventSource> {
        &self.control_events
    }

    /// Event source the data-path loop waits on.
    pub fn datapath_events(&self) -> &Arc<EventSource> {
        &self.datapath_events
    }

    /// Called by the data path. The entry belongs to the queue once this returns `Ok`;
    /// on a full queue it comes back inside `OfpError::QueueFull`.
    pub fn send_to_control(&self, entry: QueueEntry) -> Result<()> {
        Self::push(&self.to_control, &self.control_events, Events::DATAPATH_PENDING, entry)
    }

    /// Called by the control channel to drain what the data path sent.
    pub fn recv_from_datapath(&self) -> Vec<QueueEntry> {
        self.to_control.dequeue_all()
    }

    /// Called by the control channel. Same ownership rules as `send_to_control`.
    pub fn send_to_datapath(&self, entry: QueueEntry) -> Result<()> {
        Self::push(&self.to_datapath, &self.datapath_events, Events::CONTROL_PENDING, entry)
    }

    /// Called by the data path to drain what the control channel sent.
    pub fn recv_from_control(&self) -> Vec<QueueEntry> {
        self.to_datapath.dequeue_all()
    }

    fn push(queue: &CrossPathQueue<QueueEntry>,
            events: &EventSource,
            flag: Events,
            entry: QueueEntry)
            -> Result<()> {
        match queue.enqueue(entry) {
            Ok(()) => {
                events.send(flag);
                Ok(())
            }
            Err(QueueFull(rejected)) => {
                warn!(len = rejected.len(), queued = queue.len(), "queue full, entry refused");
                Err(OfpError::QueueFull(rejected))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_raises_consumer_flag() {
        let bridge = PathBridge::new(None);
        bridge.send_to_control(QueueEntry::new(vec![1, 2, 3])).unwrap();
        assert_eq!(bridge.control_events().peek(), Events::DATAPATH_PENDING);
        assert!(bridge.datapath_events().peek().is_empty());

        bridge.send_to_datapath(QueueEntry::new(vec![9])).unwrap();
        assert_eq!(bridge.datapath_events().peek(), Events::CONTROL_PENDING);

        let from_dp = bridge.recv_from_datapath();
        assert_eq!(from_dp.len(), 1);
        assert_eq!(from_dp[0].payload, vec![1, 2, 3]);
        let from_cp = bridge.recv_from_control();
        assert_eq!(from_cp[0].payload, vec![9]);
    }

    #[test]
    fn full_queue_does_not_signal() {
        let bridge = PathBridge::new(Some(1));
        bridge.send_to_control(QueueEntry::new(vec![1])).unwrap();
        bridge.control_events().wait(Events::DATAPATH_PENDING);
        match bridge.send_to_control(QueueEntry::new(vec![2])) {
            Err(OfpError::QueueFull(rejected)) => assert_eq!(rejected.payload, vec![2]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(bridge.control_events().peek().is_empty());
    }
}
