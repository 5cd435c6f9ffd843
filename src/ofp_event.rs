//! Wake-up flags for the control-channel and data-path loops.

use std::time::Duration;

use bitflags::bitflags;
use parking_lot::{Condvar, Mutex};

bitflags! {
    /// Conditions a loop can be woken for.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Events: u32 {
        /// A message from the controller is waiting to be received.
        const CONTROLLER_READABLE = 1 << 0;
        /// The data path queued messages for the control channel.
        const DATAPATH_PENDING = 1 << 1;
        /// The control channel queued messages for the data path.
        const CONTROL_PENDING = 1 << 2;
        /// The loop should return.
        const SHUTDOWN = 1 << 3;
    }
}

/// A set of coalescing event flags and a single blocking wait over them.
///
/// Setting a flag that is already set is a no-op. `wait` clears exactly the
/// flags it returns, so a flag raised again while its handler runs is seen by
/// the next `wait`.
#[derive(Debug)]
pub struct EventSource {
    pending: Mutex<Events>,
    wake: Condvar,
}

impl EventSource {
    /// A source with no flags raised.
    pub fn new() -> EventSource {
        EventSource {
            pending: Mutex::new(Events::empty()),
            wake: Condvar::new(),
        }
    }

    /// Raise `events` and wake any waiter.
    pub fn send(&self, events: Events) {
        let mut pending = self.pending.lock();
        pending.insert(events);
        self.wake.notify_all();
    }

    /// Block until at least one flag in `interest` is set, then take and return
    /// the set flags within `interest`.
    pub fn wait(&self, interest: Events) -> Events {
        let mut pending = self.pending.lock();
        while !pending.intersects(interest) {
            self.wake.wait(&mut pending);
        }
        Self::take(&mut pending, interest)
    }

    /// Like `wait`, giving up after `timeout`. Returns no flags on timeout.
    pub fn wait_timeout(&self, interest: Events, timeout: Duration) -> Events {
        let mut pending = self.pending.lock();
        if !pending.intersects(interest) {
            let _ = self.wake.wait_while_for(&mut pending, |p| !p.intersects(interest), timeout);
        }
        Self::take(&mut pending, interest)
    }

    /// Flags currently raised, without clearing them.
    pub fn peek(&self) -> Events {
        *self.pending.lock()
    }

    fn take(pending: &mut Events, interest: Events) -> Events {
        let raised = *pending & interest;
        pending.remove(raised);
        raised
    }
}

impl Default for EventSource {
    fn default() -> EventSource {
        EventSource::new()
    }
}
