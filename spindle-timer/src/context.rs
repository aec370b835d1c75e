use std::cell::RefCell;

use crate::Handle;

thread_local! {
    static CURRENT: RefCell<Option<Handle>> = const { RefCell::new(None) };
}

/// Installs `handle` as the timer of this thread until the guard drops.
pub(crate) fn enter(handle: Handle) -> ContextGuard {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        assert!(current.is_none(), "timer already set");
        *current = Some(handle);
    });
    ContextGuard { _p: () }
}

/// Returns the handle of the timer driver installed on this thread.
pub(crate) fn handle() -> Option<Handle> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Clears the thread's timer handle on drop.
#[derive(Debug)]
pub struct ContextGuard {
    _p: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let handle = CURRENT.with(|current| current.borrow_mut().take());
        assert!(handle.is_some(), "timer not set");
    }
}
