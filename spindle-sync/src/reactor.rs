use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;
use std::time::Duration;

use spindle_executor::WorkerId;

/// The services a [`Gate`] needs from the reactor it runs on.
///
/// Every method is called on the reactor thread.
///
/// [`Gate`]: crate::Gate
pub trait Reactor {
    /// Identifies a timer registered with [`Reactor::schedule_timer`].
    type Timer: Copy + Eq + Hash + Debug + 'static;

    /// Run `callback` on the reactor thread later, before the reactor
    /// becomes idle again. Must never run it inline. Callbacks deferred from
    /// the same caller run in the order they were deferred.
    fn defer(&self, callback: Box<dyn FnOnce()>);

    /// Run `callback` on the reactor thread no earlier than `after` from
    /// now, unless the timer is cancelled first. Must never run it inline.
    fn schedule_timer(&self, after: Duration, callback: Box<dyn FnOnce()>) -> Self::Timer;

    /// Cancel a timer. Cancelling a timer which already fired is a no-op.
    fn cancel_timer(&self, timer: Self::Timer);

    /// Returns the worker context currently running, or `None` when called
    /// from the reactor's top-level context.
    fn current_worker(&self) -> Option<WorkerId>;
}

impl<R: Reactor + ?Sized> Reactor for Rc<R> {
    type Timer = R::Timer;

    fn defer(&self, callback: Box<dyn FnOnce()>) {
        (**self).defer(callback)
    }

    fn schedule_timer(&self, after: Duration, callback: Box<dyn FnOnce()>) -> Self::Timer {
        (**self).schedule_timer(after, callback)
    }

    fn cancel_timer(&self, timer: Self::Timer) {
        (**self).cancel_timer(timer)
    }

    fn current_worker(&self) -> Option<WorkerId> {
        (**self).current_worker()
    }
}

/// [`Reactor`] backed by a running [`LocalExecutor`] and timer [`Driver`].
///
/// [`LocalExecutor`]: spindle_executor::LocalExecutor
/// [`Driver`]: spindle_timer::Driver
#[derive(Debug, Clone)]
pub struct LoopHandle {
    executor: spindle_executor::Handle,
    timer: spindle_timer::Handle,
}

impl LoopHandle {
    /// Combine an executor handle and a timer handle.
    pub fn new(executor: spindle_executor::Handle, timer: spindle_timer::Handle) -> Self {
        Self { executor, timer }
    }

    /// Returns the [`LoopHandle`] of the loop running on this thread.
    ///
    /// ### Panics
    /// Panics if called outside of a `block_on` call on a `LocalExecutor`
    /// with a timer `Driver` in its park stack.
    pub fn current() -> Self {
        Self::new(
            spindle_executor::Handle::current(),
            spindle_timer::Handle::current(),
        )
    }

    /// Returns the [`LoopHandle`] of the loop running on this thread, if any.
    pub fn try_current() -> Option<Self> {
        let executor = spindle_executor::Handle::try_current()?;
        let timer = spindle_timer::Handle::try_current()?;
        Some(Self::new(executor, timer))
    }

    /// Returns the executor half of this handle.
    pub fn executor(&self) -> &spindle_executor::Handle {
        &self.executor
    }

    /// Returns the timer half of this handle.
    pub fn timer(&self) -> &spindle_timer::Handle {
        &self.timer
    }
}

impl Reactor for LoopHandle {
    type Timer = spindle_timer::TimerHandle;

    fn defer(&self, callback: Box<dyn FnOnce()>) {
        self.executor.defer(callback);
    }

    fn schedule_timer(&self, after: Duration, callback: Box<dyn FnOnce()>) -> Self::Timer {
        self.timer.schedule(after, callback)
    }

    fn cancel_timer(&self, timer: Self::Timer) {
        self.timer.cancel(timer);
    }

    fn current_worker(&self) -> Option<WorkerId> {
        spindle_executor::current_worker()
    }
}
