//! Ordering guard for overlapping fit invocations.
//!
//! Every invocation takes a [`Ticket`] before it starts. A result is only
//! accepted into a [`LatestSlot`] while its ticket is still the newest one
//! issued, so a slow early fit can never replace the output of a later one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct Sequencer {
    latest: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn latest(&self) -> Option<Ticket> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            n => Some(Ticket(n)),
        }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest() == Some(ticket)
    }
}

/// Holds the most recent accepted result.
#[derive(Debug)]
pub struct LatestSlot<T> {
    sequencer: Sequencer,
    slot: Mutex<Option<(Ticket, T)>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            sequencer: Sequencer::new(),
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        self.sequencer.issue()
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.sequencer.is_current(ticket)
    }

    /// Store `value` if `ticket` is still the newest. Returns whether it was kept.
    pub fn publish(&self, ticket: Ticket, value: T) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        // Checked under the lock so two publishers cannot interleave.
        if !self.sequencer.is_current(ticket) {
            log::debug!(
                "Discarding stale result #{} (latest #{:?})",
                ticket.0,
                self.sequencer.latest().map(Ticket::value)
            );
            return false;
        }
        if matches!(slot.as_ref(), Some((held, _)) if *held >= ticket) {
            return false;
        }
        *slot = Some((ticket, value));
        true
    }

    pub fn get(&self) -> Option<T> {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(_, value)| value.clone())
    }

    pub fn ticket(&self) -> Option<Ticket> {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(ticket, _)| *ticket)
    }

    /// Forget the held value and invalidate every outstanding ticket.
    pub fn reset(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        self.sequencer.issue();
        *slot = None;
    }
}
