use std::any::Any;
use std::fmt;

use crate::WorkerId;

type Payload = Box<dyn Any + Send + 'static>;

/// Why a worker context finished without producing its output.
///
/// A worker either got cancelled, through [`JoinHandle::abort`] or queue
/// shutdown, or its future panicked. The panic payload is kept so the caller
/// can resume the unwind with [`std::panic::resume_unwind`].
///
/// [`JoinHandle::abort`]: crate::JoinHandle::abort
pub struct TaskError {
    worker: WorkerId,
    panic: Option<Payload>,
}

impl TaskError {
    pub(crate) fn cancelled(worker: WorkerId) -> Self {
        Self {
            worker,
            panic: None,
        }
    }

    pub(crate) fn panic(worker: WorkerId, payload: Payload) -> Self {
        Self {
            worker,
            panic: Some(payload),
        }
    }

    /// The worker this error belongs to.
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Returns `true` if the worker panicked.
    pub fn is_panic(&self) -> bool {
        self.panic.is_some()
    }

    /// Returns `true` if the worker was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.panic.is_none()
    }

    /// Consumes the error, returning the panic payload if the worker panicked.
    pub fn into_panic(self) -> Option<Payload> {
        self.panic
    }
}

impl std::error::Error for TaskError {}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_panic() { "panic" } else { "cancelled" };
        f.debug_struct("TaskError")
            .field("worker", &self.worker)
            .field("kind", &kind)
            .finish()
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_panic() {
            write!(f, "{} panicked", self.worker)
        } else {
            write!(f, "{} was cancelled", self.worker)
        }
    }
}
