//! Ordered store of pending timers.
//!
//! Entries are keyed by `(deadline, id)`, so expiration order is deadline
//! first and registration order second. A [`TimerHandle`] carries the same
//! key, which makes cancellation a single map removal.
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::mem;
use std::rc::Rc;

use crate::error;
use crate::sleep::SleepState;

const LOG: &str = "spindle_timer::queue";

/// Identifies a timer registered with [`Handle::schedule`].
///
/// Handles stay valid after the timer fires or is cancelled; cancelling
/// such a handle is a no-op.
///
/// [`Handle::schedule`]: crate::Handle::schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle {
    deadline: u64,
    id: u64,
}

impl TimerHandle {
    /// Returns the tick at which this timer expires.
    pub fn deadline(&self) -> u64 {
        self.deadline
    }
}

pub(crate) enum Entry {
    Callback(Box<dyn FnOnce()>),
    Sleep(Rc<SleepState>),
}

impl Entry {
    fn fire(self) {
        match self {
            Entry::Callback(callback) => callback(),
            Entry::Sleep(state) => state.fire(Ok(())),
        }
    }

    fn shutdown(self) {
        match self {
            Entry::Callback(callback) => drop(callback),
            Entry::Sleep(state) => state.fire(Err(error::Error::shutdown())),
        }
    }
}

pub(crate) struct TimerQueue {
    elapsed: Cell<u64>,
    next_id: Cell<u64>,
    shutdown: Cell<bool>,
    entries: RefCell<BTreeMap<TimerHandle, Entry>>,
}

impl std::fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue")
            .field("elapsed", &self.elapsed.get())
            .field("registered", &self.num_registered())
            .field("shutdown", &self.shutdown.get())
            .finish()
    }
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            elapsed: Cell::new(0),
            next_id: Cell::new(0),
            shutdown: Cell::new(false),
            entries: RefCell::new(BTreeMap::new()),
        }
    }

    pub(crate) fn num_registered(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Register `entry` to fire `ticks` after `now`.
    ///
    /// The entry never fires inline. A zero tick entry fires on the next
    /// call to [`TimerQueue::advance`].
    pub(crate) fn insert(&self, now: u64, ticks: u64, entry: Entry) -> TimerHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let base = now.max(self.elapsed.get());
        let handle = TimerHandle {
            deadline: base.saturating_add(ticks),
            id,
        };
        if self.shutdown.get() {
            log::trace!(target: LOG, "insert.shutdown {}", id);
            entry.shutdown();
            return handle;
        }
        self.entries.borrow_mut().insert(handle, entry);
        handle
    }

    /// Remove a pending entry without firing it.
    ///
    /// Returns false if the entry already fired or was cancelled.
    pub(crate) fn cancel(&self, handle: TimerHandle) -> bool {
        let removed = self.entries.borrow_mut().remove(&handle);
        removed.is_some()
    }

    /// Fire every entry that expired at or before `now`.
    ///
    /// Entries registered by the callbacks fired here wait for the next
    /// advance. Returns the number of fired entries and the deadline of the
    /// earliest remaining entry.
    pub(crate) fn advance(&self, now: u64) -> (usize, Option<u64>) {
        let watermark = self.next_id.get();
        self.elapsed.set(now.max(self.elapsed.get()));
        let mut fired = 0;
        loop {
            let next = {
                let mut entries = self.entries.borrow_mut();
                let due = entries
                    .first_key_value()
                    .is_some_and(|(key, _)| key.deadline <= now && key.id < watermark);
                if due {
                    entries.pop_first()
                } else {
                    None
                }
            };
            let Some((handle, entry)) = next else {
                break;
            };
            log::trace!(target: LOG, "timer.fire {} deadline={}", handle.id, handle.deadline);
            fired += 1;
            entry.fire();
        }
        let next_deadline = self.entries.borrow().first_key_value().map(|(k, _)| k.deadline);
        (fired, next_deadline)
    }

    /// Drop every pending callback and fail every pending sleep.
    pub(crate) fn shutdown(&self) {
        if self.shutdown.replace(true) {
            return;
        }
        let entries = mem::take(&mut *self.entries.borrow_mut());
        log::debug!(target: LOG, "shutdown pending={}", entries.len());
        for entry in entries.into_values() {
            entry.shutdown();
        }
    }
}
