//! [`WorkerCell`] is the allocation backing a single worker context.
//!
//! The cell owns the type-erased future, the lifecycle [`StateCell`] and a
//! weak link back to the run queue. Wakers are built directly from the
//! `Rc<WorkerCell>` pointer using a hand-written vtable, so waking a worker
//! costs a refcount bump and a queue push.
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::mem::ManuallyDrop;
use std::panic;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
use std::thread::ThreadId;

use crate::context;
use crate::error::TaskError;
use crate::state::{self, StateCell};
use crate::taskqueue::{Runnable, Shared};

const LOG: &str = "spindle_task::cell";

/// Identifies a worker context within its [`TaskQueue`].
///
/// Identifiers are assigned in spawn order and never reused by the same queue.
///
/// [`TaskQueue`]: crate::TaskQueue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Construct a [`WorkerId`] from its raw value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this [`WorkerId`].
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Receives the failure of a task whose output type has been erased.
pub(crate) trait Completion {
    fn fail(&self, err: TaskError);
}

type BoxFuture = Pin<Box<dyn Future<Output = ()>>>;

pub(crate) struct WorkerCell {
    id: WorkerId,
    state: StateCell,
    thread: ThreadId,
    future: RefCell<Option<BoxFuture>>,
    join: Rc<dyn Completion>,
    scheduler: Weak<Shared>,
}

impl fmt::Debug for WorkerCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerCell")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

const WAKER_VTABLE: RawWakerVTable =
    RawWakerVTable::new(waker_clone, waker_wake, waker_wake_by_ref, waker_drop);

impl WorkerCell {
    pub(crate) fn new(
        id: WorkerId,
        future: BoxFuture,
        join: Rc<dyn Completion>,
        scheduler: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            state: StateCell::new(),
            thread: std::thread::current().id(),
            future: RefCell::new(Some(future)),
            join,
            scheduler,
        }
    }

    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    fn waker(self: &Rc<Self>) -> Waker {
        let ptr = Rc::into_raw(Rc::clone(self)).cast::<()>();
        // Safety: `ptr` came from `Rc::into_raw` and the vtable functions
        // below treat it as an owned `Rc<WorkerCell>`.
        unsafe { Waker::from_raw(RawWaker::new(ptr, &WAKER_VTABLE)) }
    }

    /// Notify the worker, pushing it onto the run queue if required.
    pub(crate) fn notify(self: Rc<Self>) {
        match self.state.update(state::State::notify) {
            state::NotifyResult::DoNothing => {}
            state::NotifyResult::SubmitTask => self.submit(),
        }
    }

    /// Request cancellation of the worker.
    pub(crate) fn abort(self: Rc<Self>) {
        match self.state.update(state::State::abort) {
            state::AbortResult::DoNothing => {}
            state::AbortResult::SubmitTask => self.submit(),
        }
    }

    /// Cancel the worker during queue shutdown.
    pub(crate) fn shutdown(&self) {
        match self.state.update(state::State::shutdown) {
            state::ShutdownResult::AlreadyCompleted | state::ShutdownResult::Running => {}
            state::ShutdownResult::NotCompleted => self.cancel(),
        }
    }

    fn submit(self: Rc<Self>) {
        if let Some(shared) = self.scheduler.upgrade() {
            shared.push_runnable(Runnable::from(self));
        }
    }

    /// Poll the worker once.
    pub(crate) fn run(self: Rc<Self>) {
        match self.state.update(state::State::prepare_poll) {
            state::PreparePollResult::Complete => return,
            state::PreparePollResult::Cancelled => {
                self.cancel();
                self.complete();
                return;
            }
            state::PreparePollResult::Ok => {}
        }

        let waker = self.waker();
        let result = {
            let _guard = context::enter(self.id);
            let mut cx = Context::from_waker(&waker);
            let mut slot = self.future.borrow_mut();
            match slot.as_mut() {
                Some(fut) => {
                    panic::catch_unwind(panic::AssertUnwindSafe(|| fut.as_mut().poll(&mut cx)))
                }
                None => Ok(Poll::Ready(())),
            }
        };
        drop(waker);

        match result {
            Ok(Poll::Ready(())) => {
                drop(self.future.borrow_mut().take());
                self.complete();
            }
            Err(payload) => {
                log::debug!(target: LOG, "worker.panicked {}", self.id);
                drop(self.future.borrow_mut().take());
                self.join.fail(TaskError::panic(self.id, payload));
                self.complete();
            }
            Ok(Poll::Pending) => match self.state.update(state::State::complete_poll) {
                state::CompletePollResult::Ok => {}
                state::CompletePollResult::NotifiedDuringPoll => self.submit(),
                state::CompletePollResult::Cancelled => {
                    self.cancel();
                    self.complete();
                }
            },
        }
    }

    /// Drop the future and resolve the join handle with a cancellation.
    fn cancel(&self) {
        log::trace!(target: LOG, "worker.cancel {}", self.id);
        let future = self.future.borrow_mut().take();
        drop(future);
        self.join.fail(TaskError::cancelled(self.id));
    }

    fn complete(&self) {
        self.state.update(state::State::complete_task);
        if let Some(shared) = self.scheduler.upgrade() {
            shared.unbind(self.id);
        }
        log::trace!(target: LOG, "worker.complete {}", self.id);
    }
}

/// Aborts the process if a waker is used off the thread that created the task.
///
/// # Safety
/// `ptr` must come from [`WorkerCell::waker`].
unsafe fn check_caller(ptr: *const ()) {
    let cell = &*ptr.cast::<WorkerCell>();
    if cell.thread != std::thread::current().id() {
        std::process::abort();
    }
}

unsafe fn waker_clone(ptr: *const ()) -> RawWaker {
    check_caller(ptr);
    Rc::increment_strong_count(ptr.cast::<WorkerCell>());
    RawWaker::new(ptr, &WAKER_VTABLE)
}

unsafe fn waker_wake(ptr: *const ()) {
    // This is a combined wake and drop, the waker's reference moves into
    // the notification.
    check_caller(ptr);
    let cell = Rc::from_raw(ptr.cast::<WorkerCell>());
    cell.notify();
}

unsafe fn waker_wake_by_ref(ptr: *const ()) {
    check_caller(ptr);
    let cell = ManuallyDrop::new(Rc::from_raw(ptr.cast::<WorkerCell>()));
    Rc::clone(&cell).notify();
}

unsafe fn waker_drop(ptr: *const ()) {
    check_caller(ptr);
    drop(Rc::from_raw(ptr.cast::<WorkerCell>()));
}
