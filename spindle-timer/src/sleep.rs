use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use crate::queue::{Entry, TimerHandle, TimerQueue};
use crate::{error, Clock};

/// Completion state shared between a [`Sleep`] and its queue entry.
pub(crate) struct SleepState {
    complete: Cell<Option<Result<(), error::Error>>>,
    waker: RefCell<Option<Waker>>,
}

impl SleepState {
    fn new() -> Self {
        Self {
            complete: Cell::new(None),
            waker: RefCell::new(None),
        }
    }

    pub(crate) fn fire(&self, completion: Result<(), error::Error>) {
        self.complete.set(Some(completion));
        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Unregistered,
    Registered(TimerHandle),
    Fired,
}

/// Future returned by [`Handle::sleep`].
///
/// This future will resolve once the specified duration has elapsed,
/// or the time driver is shutdown.
///
/// [`Handle::sleep`]: crate::Handle::sleep
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Sleep {
    queue: Rc<TimerQueue>,
    clock: Clock,
    duration: Duration,
    shared: Rc<SleepState>,
    state: State,
}

impl std::fmt::Debug for Sleep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sleep")
            .field("duration", &self.duration)
            .field("state", &self.state)
            .finish()
    }
}

impl Sleep {
    pub(crate) fn new(queue: Rc<TimerQueue>, clock: Clock, duration: Duration) -> Self {
        Self {
            queue,
            clock,
            duration,
            shared: Rc::new(SleepState::new()),
            state: State::Unregistered,
        }
    }

    /// Reset the timer.
    ///
    /// This will clear any timer state and reset it
    /// for its initial duration on the next poll.
    pub fn reset(&mut self) {
        if let State::Registered(handle) = self.state {
            self.queue.cancel(handle);
        }
        self.shared = Rc::new(SleepState::new());
        self.state = State::Unregistered;
    }
}

impl Future for Sleep {
    type Output = Result<(), error::Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        loop {
            if let Some(complete) = self.shared.complete.take() {
                self.state = State::Fired;
                return Poll::Ready(complete);
            }
            match self.state {
                State::Unregistered => {
                    let (now, ticks) = self.clock.registration(self.duration);
                    let entry = Entry::Sleep(Rc::clone(&self.shared));
                    let handle = self.queue.insert(now, ticks, entry);
                    self.state = State::Registered(handle);
                    continue;
                }
                State::Registered(_) => {
                    let mut w = self.shared.waker.borrow_mut();
                    if !w
                        .as_ref()
                        .is_some_and(|existing| existing.will_wake(cx.waker()))
                    {
                        *w = Some(cx.waker().clone());
                    }
                    return Poll::Pending;
                }
                State::Fired => return Poll::Ready(Ok(())),
            }
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let State::Registered(handle) = self.state {
            self.queue.cancel(handle);
        }
    }
}

pin_project_lite::pin_project! {
    /// Future returned by [`Handle::timeout`].
    ///
    /// Resolves with the output of the wrapped future, or an
    /// [`ErrorKind::Elapsed`] error once the deadline passes first.
    ///
    /// [`Handle::timeout`]: crate::Handle::timeout
    /// [`ErrorKind::Elapsed`]: crate::ErrorKind::Elapsed
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Timeout<F> {
        #[pin]
        future: F,
        sleep: Sleep,
    }
}

impl<F> std::fmt::Debug for Timeout<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeout")
            .field("sleep", &self.sleep)
            .finish()
    }
}

impl<F> Timeout<F> {
    pub(crate) fn new(future: F, sleep: Sleep) -> Self {
        Self { future, sleep }
    }
}

impl<F> Future for Timeout<F>
where
    F: Future,
{
    type Output = Result<F::Output, error::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = self.project();
        if let Poll::Ready(output) = me.future.poll(cx) {
            return Poll::Ready(Ok(output));
        }
        match Pin::new(me.sleep).poll(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(Err(error::Error::elapsed())),
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => Poll::Pending,
        }
    }
}
