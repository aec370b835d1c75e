use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::mem;
use std::rc::Rc;

use crate::cell::{Completion, WorkerCell};
use crate::error::TaskError;
use crate::join::JoinSlot;
use crate::{JoinHandle, WorkerId};

const LOG: &str = "spindle_task::taskqueue";

/// [`TaskQueue`] provides a way to spawn and run tasks.
///
/// ```rust
/// let tq = spindle_task::TaskQueue::new();
///
/// tq.spawn(async { println!("Hello world") }).detach();
/// while let Some(runnable) = tq.next() {
///     runnable.run();
/// }
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    shared: Rc<Shared>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("runnable", &self.runnable())
            .field("live", &self.live())
            .finish()
    }
}

pub(crate) struct Shared {
    runqueue: RefCell<VecDeque<Runnable>>,
    tasks: RefCell<HashMap<WorkerId, Rc<WorkerCell>>>,
    next_id: Cell<u64>,
    closed: Cell<bool>,
}

impl TaskQueue {
    /// Construct a new [`TaskQueue`].
    pub fn new() -> Self {
        let shared = Shared {
            runqueue: RefCell::new(VecDeque::with_capacity(1024)),
            tasks: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            closed: Cell::new(false),
        };
        Self {
            shared: Rc::new(shared),
        }
    }

    /// Spawn a [`Future`] onto the [`TaskQueue`].
    ///
    /// The future will immediately be queued for execution. Returns a [`JoinHandle`]
    /// which can be used to await the result of the future.
    ///
    /// If the queue has already been shut down, the returned [`JoinHandle`]
    /// resolves immediately with cancellation.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let id = WorkerId::new(self.shared.next_id.get());
        self.shared.next_id.set(id.as_u64() + 1);

        let slot = Rc::new(JoinSlot::new());
        if self.shared.closed.get() {
            slot.fail(TaskError::cancelled(id));
            return JoinHandle::new(id, slot, std::rc::Weak::new());
        }

        let output = Rc::clone(&slot);
        let wrapped = Box::pin(async move {
            let value = future.await;
            output.complete(Ok(value));
        });
        let join: Rc<dyn Completion> = slot.clone();
        let cell = Rc::new(WorkerCell::new(
            id,
            wrapped,
            join,
            Rc::downgrade(&self.shared),
        ));
        let handle = JoinHandle::new(id, slot, Rc::downgrade(&cell));

        self.shared.tasks.borrow_mut().insert(id, Rc::clone(&cell));
        self.shared.push_runnable(Runnable::from(cell));
        log::trace!(target: LOG, "spawn {}", id);
        handle
    }

    /// Returns the next [`Runnable`] to be executed.
    pub fn next(&self) -> Option<Runnable> {
        self.shared.runqueue.borrow_mut().pop_front()
    }

    /// Returns the number of [`Runnable`]s in the queue.
    pub fn runnable(&self) -> usize {
        self.shared.runqueue.borrow().len()
    }

    /// Returns the number of spawned tasks which have not yet completed.
    pub fn live(&self) -> usize {
        self.shared.tasks.borrow().len()
    }

    /// Shutdown the [`TaskQueue`].
    ///
    /// Cancels all tasks and drops their [`Future`]s. Tasks spawned
    /// afterwards resolve immediately with cancellation.
    pub fn shutdown(&self) {
        self.shared.closed.set(true);
        let tasks = mem::take(&mut *self.shared.tasks.borrow_mut());
        log::debug!(target: LOG, "shutdown live={}", tasks.len());
        for task in tasks.into_values() {
            task.shutdown();
        }
        let runqueue = mem::take(&mut *self.shared.runqueue.borrow_mut());
        drop(runqueue);
    }
}

impl Shared {
    pub(crate) fn push_runnable(&self, runnable: Runnable) {
        if self.closed.get() {
            return;
        }
        self.runqueue.borrow_mut().push_back(runnable);
    }

    pub(crate) fn unbind(&self, id: WorkerId) {
        let removed = self.tasks.borrow_mut().remove(&id);
        drop(removed);
    }
}

/// [`Runnable`] is a handle to a task that can be executed.
///
/// Callers should invoke [`Runnable::run`] to execute the task.
pub struct Runnable(Rc<WorkerCell>);

impl std::fmt::Debug for Runnable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Runnable").field(&self.0.id()).finish()
    }
}

impl Runnable {
    /// Run the task.
    ///
    /// This will advance the task to completion, or until it is parked.
    pub fn run(self) {
        self.0.run();
    }
}

impl From<Rc<WorkerCell>> for Runnable {
    fn from(task: Rc<WorkerCell>) -> Self {
        Runnable(task)
    }
}
