use std::cell::Cell;

use crate::WorkerId;

thread_local! {
    static CURRENT: Cell<Option<WorkerId>> = const { Cell::new(None) };
}

/// Returns the [`WorkerId`] of the worker context being polled on this thread.
///
/// Returns `None` when called from the reactor's own top-level context,
/// such as the root future passed to `block_on` or a plain callback.
pub fn current() -> Option<WorkerId> {
    CURRENT.with(|c| c.get())
}

/// Marks `id` as the current worker until the guard drops.
///
/// The previous value is restored on drop so nested reactors keep
/// their own bookkeeping.
pub(crate) fn enter(id: WorkerId) -> WorkerGuard {
    let prev = CURRENT.with(|c| c.replace(Some(id)));
    WorkerGuard { prev }
}

#[derive(Debug)]
pub(crate) struct WorkerGuard {
    prev: Option<WorkerId>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        CURRENT.with(|c| c.set(self.prev));
    }
}
