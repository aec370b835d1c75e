//! Timer driver for the Spindle reactor.
//!
//! The [`Driver`] is a [`Park`] layer. Every time the executor runs out of
//! work it parks through the driver, which fires the expired timers on the
//! reactor thread and narrows the park timeout to the next deadline before
//! handing control to the layer below.
//!
//! Timers come in two shapes: callbacks registered with
//! [`Handle::schedule`] and cancelled with [`Handle::cancel`], and the
//! [`Sleep`] and [`Timeout`] futures.
//!
//! [`Park`]: spindle_executor::park::Park
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

pub use clock::Clock;
pub use error::{Error, ErrorKind};
pub use queue::TimerHandle;
pub use sleep::{Sleep, Timeout};
use spindle_executor::park::{Park, ParkMode};

mod clock;
mod context;
mod error;
mod queue;
mod sleep;
#[cfg(test)]
mod tests;

const LOG: &str = "spindle_timer";

/// [`Driver`] for time based operations.
///
/// This supports driving multiple timers simultaneously.
pub struct Driver<P> {
    queue: Rc<queue::TimerQueue>,
    inner: P,
    clock: Clock,
}

impl<P> std::fmt::Debug for Driver<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("queue", &self.queue)
            .field("clock", &self.clock)
            .finish()
    }
}

/// Handle to the timer driver.
///
/// This can be used to create new timers.
#[derive(Clone)]
pub struct Handle {
    queue: Rc<queue::TimerQueue>,
    clock: Clock,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("clock", &self.clock)
            .finish()
    }
}

impl Handle {
    /// Run `callback` on the reactor thread once `after` has elapsed.
    ///
    /// The callback never runs inline, even for a zero duration; it runs
    /// the next time the driver parks after the deadline. The returned
    /// [`TimerHandle`] can be passed to [`Handle::cancel`].
    pub fn schedule<F>(&self, after: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        let (now, ticks) = self.clock.registration(after);
        let handle = self
            .queue
            .insert(now, ticks, queue::Entry::Callback(Box::new(callback)));
        log::trace!(target: LOG, "schedule {:?} deadline={}", after, handle.deadline());
        handle
    }

    /// Cancel a timer registered with [`Handle::schedule`].
    ///
    /// Returns `false` if the timer already fired or was cancelled.
    pub fn cancel(&self, timer: TimerHandle) -> bool {
        self.queue.cancel(timer)
    }

    /// Create a new timer with the specified duration.
    ///
    /// Once the duration has elapsed, the timer will fire.
    pub fn sleep(&self, duration: Duration) -> Sleep {
        Sleep::new(self.queue.clone(), self.clock.clone(), duration)
    }

    /// Require `future` to complete within `duration`.
    pub fn timeout<F>(&self, duration: Duration, future: F) -> Timeout<F>
    where
        F: Future,
    {
        Timeout::new(future, self.sleep(duration))
    }

    /// Returns the number of pending timers.
    pub fn pending(&self) -> usize {
        self.queue.num_registered()
    }

    /// Get the clock used by the timer.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Get a handle to the current timer.
    ///
    /// ### Panics
    /// This will panic if called from outside of a timer context.
    pub fn current() -> Self {
        context::handle().expect("timer not started")
    }

    /// Get a handle to the current timer, if one is running on this thread.
    pub fn try_current() -> Option<Self> {
        context::handle()
    }
}

/// Sleep for `duration` on the current timer.
///
/// ### Panics
/// This will panic if called from outside of a timer context.
pub fn sleep(duration: Duration) -> Sleep {
    Handle::current().sleep(duration)
}

impl<P> Driver<P> {
    /// Create a new timer driver with the provided clock.
    ///
    /// The clock will be used to determine the current time.
    pub fn new(inner: P, clock: Clock) -> Self {
        Self {
            queue: Rc::new(queue::TimerQueue::new()),
            inner,
            clock,
        }
    }

    /// Get a handle to the timer driver.
    pub fn handle(&self) -> Handle {
        Handle {
            clock: self.clock.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<P> Drop for Driver<P> {
    fn drop(&mut self) {
        // Pending sleepers must observe the shutdown even when the driver is
        // dropped without going through Park::shutdown.
        self.queue.shutdown();
    }
}

impl<P> Park for Driver<P>
where
    P: Park,
{
    type Unparker = P::Unparker;

    type Guard = (context::ContextGuard, P::Guard);

    fn park(&mut self, mut mode: ParkMode) -> Result<(), std::io::Error> {
        let ticks = self.clock.tick();

        let (fired, next_expiration) = self.queue.advance(ticks);
        if fired > 0 {
            mode = ParkMode::NoPark;
        }
        if let Some(deadline) = next_expiration {
            let delta = deadline.saturating_sub(ticks);
            let duration = self.clock.tick_to_duration(delta);
            mode = match mode {
                ParkMode::NoPark => ParkMode::NoPark,
                ParkMode::Timeout(timeout) => ParkMode::Timeout(timeout.min(duration)),
                ParkMode::NextCompletion => ParkMode::Timeout(duration),
            };
        }
        self.inner.park(mode)
    }

    fn enter(&self) -> Self::Guard {
        let guard = context::enter(self.handle());
        (guard, self.inner.enter())
    }

    fn unparker(&self) -> Self::Unparker {
        self.inner.unparker()
    }

    fn needs_park(&self) -> bool {
        self.inner.needs_park()
    }

    fn shutdown(&mut self) {
        self.queue.shutdown();
        self.inner.shutdown()
    }
}
