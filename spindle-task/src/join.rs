use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use crate::cell::{Completion, WorkerCell};
use crate::error::TaskError;
use crate::WorkerId;

/// Output slot shared between a task and its [`JoinHandle`].
pub(crate) struct JoinSlot<T> {
    output: RefCell<Option<Result<T, TaskError>>>,
    waker: RefCell<Option<Waker>>,
}

impl<T> JoinSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            output: RefCell::new(None),
            waker: RefCell::new(None),
        }
    }

    pub(crate) fn complete(&self, result: Result<T, TaskError>) {
        {
            let mut output = self.output.borrow_mut();
            if output.is_some() {
                return;
            }
            *output = Some(result);
        }
        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn poll_result(&self, waker: &Waker) -> Poll<Result<T, TaskError>> {
        if let Some(output) = self.output.borrow_mut().take() {
            return Poll::Ready(output);
        }
        let mut slot = self.waker.borrow_mut();
        match slot.as_mut() {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
        Poll::Pending
    }
}

impl<T> Completion for JoinSlot<T> {
    fn fail(&self, err: TaskError) {
        self.complete(Err(err));
    }
}

/// A handle to the spawned task.
///
/// [`JoinHandle`] provides a handle to the spawned task that can be awaited. If
/// the [`JoinHandle`] is dropped while the task is running, it will continue
/// running in the background.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct JoinHandle<T> {
    id: WorkerId,
    slot: Rc<JoinSlot<T>>,
    task: Weak<WorkerCell>,
}

impl<T> std::fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinHandle").field("id", &self.id).finish()
    }
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(id: WorkerId, slot: Rc<JoinSlot<T>>, task: Weak<WorkerCell>) -> Self {
        Self { id, slot, task }
    }

    /// Returns the [`WorkerId`] of the spawned task.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Returns `true` once the task has completed, panicked, or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.task
            .upgrade()
            .map_or(true, |task| task.is_complete())
    }

    /// Abort the task associated with this [`JoinHandle`].
    ///
    /// Aborting the task will eventually stop the task from running. If the
    /// task already completed, it's result will be returned. If the task has
    /// not yet completed, it will be cancelled and the [`JoinHandle`] will
    /// resolve to an error.
    pub fn abort(&self) {
        if let Some(task) = self.task.upgrade() {
            task.abort();
        }
    }

    /// Detach the task from this [`JoinHandle`].
    ///
    /// This is a convenience method that will drop the [`JoinHandle`] without
    /// cancelling the task. This signals intent to the reader that the task
    /// result is not needed.
    pub fn detach(self) {}
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.slot.poll_result(cx.waker())
    }
}
