//! Task state transitions.

use std::cell::Cell;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    struct Flags: u8 {
        /// The task has been notified and sits in the run queue.
        const NOTIFIED    = 1<<0;
        /// The task is currently being polled.
        const RUNNING     = 1<<1;
        /// The task has completed, been cancelled or panicked.
        const COMPLETE    = 1<<2;
        /// The task has been cancelled.
        const CANCELLED   = 1<<3;
    }
}

/// [`StateCell`] tracks the lifecycle flags of a single task.
pub(crate) struct StateCell {
    state: Cell<State>,
}

impl StateCell {
    /// Build a new [`StateCell`] with the `NOTIFIED` flag set.
    ///
    /// Freshly spawned tasks are pushed straight onto the run queue.
    pub(crate) fn new() -> Self {
        Self {
            state: Cell::new(State::new()),
        }
    }

    /// Update the state in this [`StateCell`].
    #[inline]
    pub(crate) fn update<U>(&self, f: impl FnOnce(&mut State) -> U) -> U {
        let mut state = self.state.get();
        let res = f(&mut state);
        self.state.set(state);
        res
    }

    /// Returns true if the task is complete.
    #[inline]
    pub(crate) fn is_complete(&self) -> bool {
        self.state.get().flags.contains(Flags::COMPLETE)
    }
}

impl std::fmt::Debug for StateCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StateCell").field(&self.state.get()).finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct State {
    flags: Flags,
}

impl State {
    fn new() -> Self {
        Self {
            flags: Flags::NOTIFIED,
        }
    }

    /// Prepare the task for polling.
    ///
    /// This consumes prior notifications and sets
    /// the `RUNNING` flag, informing future notifications
    /// that the task is already running.
    #[inline]
    pub(crate) fn prepare_poll(&mut self) -> PreparePollResult {
        assert!(self.flags.contains(Flags::NOTIFIED));
        assert!(!self.flags.contains(Flags::RUNNING));

        self.flags.remove(Flags::NOTIFIED);
        if self.flags.contains(Flags::COMPLETE) {
            return PreparePollResult::Complete;
        }
        self.flags.insert(Flags::RUNNING);
        if self.flags.contains(Flags::CANCELLED) {
            return PreparePollResult::Cancelled;
        }
        PreparePollResult::Ok
    }

    /// Conclude polling for a task.
    ///
    /// This clears the `RUNNING` flag and returns
    /// whether the task was notified during polling or if it is cancelled.
    #[inline]
    pub(crate) fn complete_poll(&mut self) -> CompletePollResult {
        assert!(self.flags.contains(Flags::RUNNING));

        if self.flags.contains(Flags::CANCELLED) {
            return CompletePollResult::Cancelled;
        }
        self.flags.remove(Flags::RUNNING);
        if self.flags.contains(Flags::NOTIFIED) {
            return CompletePollResult::NotifiedDuringPoll;
        }
        CompletePollResult::Ok
    }

    /// Mark the task as complete.
    #[inline]
    pub(crate) fn complete_task(&mut self) {
        assert!(!self.flags.contains(Flags::COMPLETE));
        self.flags.insert(Flags::COMPLETE);
        self.flags.remove(Flags::RUNNING);
    }

    /// Notify the task.
    ///
    /// Returns instructions if the task should be submitted to the run queue.
    #[inline]
    pub(crate) fn notify(&mut self) -> NotifyResult {
        if self.flags.contains(Flags::COMPLETE) || self.flags.contains(Flags::NOTIFIED) {
            return NotifyResult::DoNothing;
        }

        self.flags.insert(Flags::NOTIFIED);
        if self.flags.contains(Flags::RUNNING) {
            // Don't re-submit the task if it is running already.
            NotifyResult::DoNothing
        } else {
            NotifyResult::SubmitTask
        }
    }

    /// Shutdown the task.
    ///
    /// A task that is currently running is only flagged as cancelled; the
    /// poll in progress notices the flag once it returns.
    #[inline]
    pub(crate) fn shutdown(&mut self) -> ShutdownResult {
        if self.flags.contains(Flags::COMPLETE) {
            return ShutdownResult::AlreadyCompleted;
        }
        self.flags.insert(Flags::CANCELLED);
        if self.flags.contains(Flags::RUNNING) {
            return ShutdownResult::Running;
        }
        self.flags.insert(Flags::COMPLETE);
        ShutdownResult::NotCompleted
    }

    /// Abort the task.
    ///
    /// This is called directly from the [`JoinHandle`] by the application.
    ///
    /// [`JoinHandle`]: crate::JoinHandle
    #[inline]
    pub(crate) fn abort(&mut self) -> AbortResult {
        if self.flags.contains(Flags::CANCELLED) || self.flags.contains(Flags::COMPLETE) {
            return AbortResult::DoNothing;
        }

        self.flags.insert(Flags::CANCELLED);
        if self.flags.contains(Flags::RUNNING) {
            // Cancelled while running. Setting NOTIFIED makes the poll
            // conclusion observe the cancellation.
            self.flags.insert(Flags::NOTIFIED);
            return AbortResult::DoNothing;
        }
        if self.flags.contains(Flags::NOTIFIED) {
            // Already queued, the cancellation is noticed on the next poll.
            return AbortResult::DoNothing;
        }
        self.flags.insert(Flags::NOTIFIED);
        AbortResult::SubmitTask
    }
}

#[must_use = "this `PreparePollResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum PreparePollResult {
    Ok,
    Complete,
    Cancelled,
}

#[must_use = "this `CompletePollResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CompletePollResult {
    NotifiedDuringPoll,
    Cancelled,
    Ok,
}

#[must_use = "this `NotifyResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum NotifyResult {
    DoNothing,
    SubmitTask,
}

#[must_use = "this `ShutdownResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ShutdownResult {
    AlreadyCompleted,
    NotCompleted,
    Running,
}

#[must_use = "this `AbortResult` may be a `SubmitTask` variant, which should be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum AbortResult {
    DoNothing,
    SubmitTask,
}
