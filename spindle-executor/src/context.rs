use std::cell::RefCell;

use crate::Handle;

thread_local! {
    static CURRENT: RefCell<Option<Handle>> = const { RefCell::new(None) };
}

pub(crate) struct Context;

impl Context {
    pub(crate) fn enter(handle: Handle) -> ContextGuard {
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            assert!(current.is_none(), "executor already set");
            *current = Some(handle);
        });
        ContextGuard {}
    }

    /// Returns the handle of the executor running on this thread.
    pub(crate) fn handle() -> Option<Handle> {
        CURRENT.with(|c| c.borrow().clone())
    }
}

#[derive(Debug)]
pub(crate) struct ContextGuard;

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let handle = CURRENT.with(|current| current.borrow_mut().take());
        assert!(handle.is_some(), "executor not set");
    }
}
