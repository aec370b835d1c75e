//! Manual-reset event for worker contexts.
//!
//! A [`Gate`] is either clear or signaled. Waiting on a clear gate suspends
//! the calling worker until [`Gate::signal`] runs or the wait's deadline
//! passes, whichever comes first. The two resumption paths differ on
//! purpose:
//!
//! - `signal` defers every resumption through [`Reactor::defer`], so none of
//!   the waiters run before the signalling code returns to the reactor.
//! - a deadline fires from a reactor timer, which already runs on the
//!   reactor thread, so the timer callback resumes its waiter directly.
//!
//! Each waiter sits in the waiter map and, when it has a deadline, in the
//! timeout map under the same key. Whichever path removes the key first
//! resumes the waiter. The loser finds nothing to remove.
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use spindle_executor::WorkerId;

use crate::reactor::{LoopHandle, Reactor};
use crate::Error;

const LOG: &str = "spindle_sync::gate";

/// How a [`Wait`] was resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The gate was signaled, either before the wait or while suspended.
    Signaled,
    /// The wait's deadline passed first.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WaiterKey(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Waiting,
    Resumed(WaitOutcome),
    Abandoned,
}

/// Resumption slot shared between a [`Wait`] and the callbacks that may
/// resume it.
#[derive(Debug)]
struct Waiter {
    worker: WorkerId,
    resume: Cell<Resume>,
    waker: RefCell<Option<Waker>>,
}

impl Waiter {
    fn resume(&self, outcome: WaitOutcome) {
        if self.resume.get() != Resume::Waiting {
            log::trace!(target: LOG, "gate.resume.skip {}", self.worker);
            return;
        }
        log::trace!(target: LOG, "gate.resume {} {:?}", self.worker, outcome);
        self.resume.set(Resume::Resumed(outcome));
        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

struct State<T> {
    signaled: bool,
    next_key: u64,
    waiters: HashMap<WaiterKey, Rc<Waiter>>,
    timeouts: HashMap<WaiterKey, T>,
}

/// A manual-reset event which worker contexts can wait on.
///
/// The gate starts clear. [`Gate::signal`] sets it and schedules the
/// resumption of every waiter; it stays set until [`Gate::clear`]. All
/// methods must be called on the reactor thread.
///
/// A pending [`Wait`] borrows its gate, so a gate cannot be dropped while
/// one of its waits is still alive.
pub struct Gate<R: Reactor = LoopHandle> {
    reactor: R,
    state: Rc<RefCell<State<R::Timer>>>,
}

impl<R: Reactor> std::fmt::Debug for Gate<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Gate")
            .field("signaled", &state.signaled)
            .field("waiters", &state.waiters.len())
            .field("pending_timeouts", &state.timeouts.len())
            .finish()
    }
}

impl Gate<LoopHandle> {
    /// Create a clear gate on the loop running on this thread.
    ///
    /// ### Panics
    /// Panics if no loop is running on this thread, see
    /// [`LoopHandle::current`].
    pub fn current() -> Self {
        Self::new(LoopHandle::current())
    }
}

impl<R: Reactor> Gate<R> {
    /// Create a clear gate which schedules its callbacks on `reactor`.
    pub fn new(reactor: R) -> Self {
        Self {
            reactor,
            state: Rc::new(RefCell::new(State {
                signaled: false,
                next_key: 0,
                waiters: HashMap::new(),
                timeouts: HashMap::new(),
            })),
        }
    }

    /// Returns true if the gate is signaled.
    pub fn is_signaled(&self) -> bool {
        self.state.borrow().signaled
    }

    /// Clear the gate. Suspended waiters stay suspended.
    pub fn clear(&self) {
        self.state.borrow_mut().signaled = false;
    }

    /// Signal the gate and schedule the resumption of every waiter.
    ///
    /// Pending deadlines are cancelled. Waiters resume from the reactor's
    /// deferred callback queue, never before this call returns.
    pub fn signal(&self) {
        let (timeouts, waiters) = {
            let mut state = self.state.borrow_mut();
            state.signaled = true;
            (
                std::mem::take(&mut state.timeouts),
                std::mem::take(&mut state.waiters),
            )
        };
        log::trace!(
            target: LOG,
            "gate.signal waiters={} timeouts={}",
            waiters.len(),
            timeouts.len()
        );
        for timer in timeouts.into_values() {
            self.reactor.cancel_timer(timer);
        }
        for waiter in waiters.into_values() {
            self.reactor
                .defer(Box::new(move || waiter.resume(WaitOutcome::Signaled)));
        }
    }

    /// Wait for the gate to be signaled, for at most `timeout` if given.
    ///
    /// The returned future completes immediately if the gate is already
    /// signaled when first polled. Otherwise it suspends the calling worker
    /// until [`Gate::signal`] or the deadline resumes it.
    ///
    /// ### Panics
    /// The returned future panics when polled outside of a worker context,
    /// for example directly from the future passed to `block_on`. Use
    /// [`Gate::try_wait`] to check this up front.
    pub fn wait(&self, timeout: Option<Duration>) -> Wait<'_, R> {
        Wait {
            gate: self,
            timeout,
            state: WaitState::Init,
        }
    }

    /// Like [`Gate::wait`], but fails with [`ErrorKind::NotInWorker`] when
    /// called outside of a worker context.
    ///
    /// [`ErrorKind::NotInWorker`]: crate::ErrorKind::NotInWorker
    pub fn try_wait(&self, timeout: Option<Duration>) -> Result<Wait<'_, R>, Error> {
        if self.reactor.current_worker().is_none() {
            return Err(Error::not_in_worker());
        }
        Ok(self.wait(timeout))
    }

    /// Returns the number of suspended waiters.
    pub fn waiters(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    /// Returns the number of waiters with a pending deadline.
    pub fn pending_timeouts(&self) -> usize {
        self.state.borrow().timeouts.len()
    }

    fn register(&self, worker: WorkerId, waker: &Waker, timeout: Option<Duration>) -> Registered {
        let waiter = Rc::new(Waiter {
            worker,
            resume: Cell::new(Resume::Waiting),
            waker: RefCell::new(Some(waker.clone())),
        });
        let key = {
            let mut state = self.state.borrow_mut();
            let key = WaiterKey(state.next_key);
            state.next_key += 1;
            state.waiters.insert(key, Rc::clone(&waiter));
            key
        };
        log::trace!(target: LOG, "gate.wait {} timeout={:?}", worker, timeout);

        if let Some(timeout) = timeout {
            let state = Rc::downgrade(&self.state);
            let timer = self
                .reactor
                .schedule_timer(timeout, Box::new(move || expire(&state, key)));
            self.state.borrow_mut().timeouts.insert(key, timer);
        }
        Registered { key, waiter }
    }

    fn deregister(&self, key: WaiterKey) {
        let timer = {
            let mut state = self.state.borrow_mut();
            state.waiters.remove(&key);
            state.timeouts.remove(&key)
        };
        if let Some(timer) = timer {
            self.reactor.cancel_timer(timer);
        }
    }
}

impl<R: Reactor> Drop for Gate<R> {
    fn drop(&mut self) {
        let state = self.state.borrow();
        if !state.waiters.is_empty() {
            log::warn!(
                target: LOG,
                "gate.drop leaking {} suspended waiters",
                state.waiters.len()
            );
        }
    }
}

/// Timer callback for a waiter's deadline.
fn expire<T>(state: &Weak<RefCell<State<T>>>, key: WaiterKey) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let waiter = {
        let mut state = state.borrow_mut();
        state.timeouts.remove(&key);
        state.waiters.remove(&key)
    };
    match waiter {
        Some(waiter) => waiter.resume(WaitOutcome::TimedOut),
        None => log::trace!(target: LOG, "gate.expire.stale {:?}", key),
    }
}

struct Registered {
    key: WaiterKey,
    waiter: Rc<Waiter>,
}

enum WaitState {
    Init,
    Registered(Registered),
    Done,
}

/// Future returned by [`Gate::wait`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Wait<'a, R: Reactor = LoopHandle> {
    gate: &'a Gate<R>,
    timeout: Option<Duration>,
    state: WaitState,
}

impl<R: Reactor> std::fmt::Debug for Wait<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            WaitState::Init => "init",
            WaitState::Registered(_) => "registered",
            WaitState::Done => "done",
        };
        f.debug_struct("Wait")
            .field("timeout", &self.timeout)
            .field("state", &state)
            .finish()
    }
}

impl<R: Reactor> Future for Wait<'_, R> {
    type Output = WaitOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &this.state {
            WaitState::Init => {
                let Some(worker) = this.gate.reactor.current_worker() else {
                    panic!("Gate::wait must be awaited from a worker context");
                };
                if this.gate.is_signaled() {
                    this.state = WaitState::Done;
                    return Poll::Ready(WaitOutcome::Signaled);
                }
                let registered = this.gate.register(worker, cx.waker(), this.timeout);
                this.state = WaitState::Registered(registered);
                Poll::Pending
            }
            WaitState::Registered(registered) => match registered.waiter.resume.get() {
                Resume::Resumed(outcome) => {
                    this.state = WaitState::Done;
                    Poll::Ready(outcome)
                }
                Resume::Waiting | Resume::Abandoned => {
                    let mut waker = registered.waiter.waker.borrow_mut();
                    if !waker
                        .as_ref()
                        .is_some_and(|existing| existing.will_wake(cx.waker()))
                    {
                        *waker = Some(cx.waker().clone());
                    }
                    Poll::Pending
                }
            },
            WaitState::Done => panic!("Wait polled after completion"),
        }
    }
}

impl<R: Reactor> Drop for Wait<'_, R> {
    fn drop(&mut self) {
        if let WaitState::Registered(registered) = &self.state {
            if registered.waiter.resume.get() == Resume::Waiting {
                log::trace!(target: LOG, "gate.wait.abandon {}", registered.waiter.worker);
                registered.waiter.resume.set(Resume::Abandoned);
                self.gate.deregister(registered.key);
            }
        }
    }
}
