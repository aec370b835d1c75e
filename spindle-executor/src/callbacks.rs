//! Deferred callbacks and callbacks registered for remote firing.
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::mem;

use crate::remote::Token;

const LOG: &str = "spindle_executor::callbacks";

pub(crate) type Callback = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct Callbacks {
    deferred: RefCell<VecDeque<Callback>>,
    registered: RefCell<HashMap<Token, Callback>>,
    next_token: Cell<u64>,
    closed: Cell<bool>,
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("deferred", &self.deferred.borrow().len())
            .field("registered", &self.registered.borrow().len())
            .field("closed", &self.closed.get())
            .finish()
    }
}

impl Callbacks {
    pub(crate) fn defer(&self, callback: Callback) {
        if self.closed.get() {
            log::trace!(target: LOG, "defer.closed");
            return;
        }
        self.deferred.borrow_mut().push_back(callback);
    }

    pub(crate) fn register(&self, callback: Callback) -> Option<Token> {
        if self.closed.get() {
            return None;
        }
        let token = Token::new(self.next_token.get());
        self.next_token.set(self.next_token.get() + 1);
        self.registered.borrow_mut().insert(token, callback);
        Some(token)
    }

    pub(crate) fn unregister(&self, token: Token) -> bool {
        let removed = self.registered.borrow_mut().remove(&token);
        removed.is_some()
    }

    /// Moves the callback registered under `token` to the deferred queue.
    pub(crate) fn fire(&self, token: Token) {
        let callback = self.registered.borrow_mut().remove(&token);
        match callback {
            Some(callback) => self.defer(callback),
            None => log::trace!(target: LOG, "fire.unknown_token {:?}", token),
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.deferred.borrow().len()
    }

    /// Runs the callbacks queued before this call.
    ///
    /// Callbacks deferred while running stay queued for the next turn.
    pub(crate) fn run_deferred(&self) -> usize {
        let batch = self.pending();
        for _ in 0..batch {
            let next = self.deferred.borrow_mut().pop_front();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
        batch
    }

    pub(crate) fn shutdown(&self) {
        self.closed.set(true);
        let deferred = mem::take(&mut *self.deferred.borrow_mut());
        let registered = mem::take(&mut *self.registered.borrow_mut());
        log::debug!(
            target: LOG,
            "shutdown deferred={} registered={}",
            deferred.len(),
            registered.len()
        );
        drop(deferred);
        drop(registered);
    }
}
