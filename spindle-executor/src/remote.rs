//! Thread-safe entry point into the reactor.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::park::Unpark;

const LOG: &str = "spindle_executor::remote";

/// Identifies a callback registered with [`Handle::register`].
///
/// Tokens are `Send`, so they can travel to other threads and come back
/// through [`Remote::fire`].
///
/// [`Handle::register`]: crate::Handle::register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl Token {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

pub(crate) struct RemoteQueue {
    fired: Mutex<Vec<Token>>,
    unparker: Box<dyn Unpark + Send + Sync>,
    closed: AtomicBool,
}

impl std::fmt::Debug for RemoteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteQueue")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl RemoteQueue {
    pub(crate) fn new(unparker: Box<dyn Unpark + Send + Sync>) -> Self {
        Self {
            fired: Mutex::new(Vec::new()),
            unparker,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn unpark(&self) {
        self.unparker.unpark();
    }

    pub(crate) fn drain(&self) -> Vec<Token> {
        std::mem::take(&mut *self.fired.lock())
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.fired.lock().is_empty()
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.fired.lock().clear();
    }
}

/// A `Send + Sync` handle for waking the reactor from other threads.
///
/// Obtained from [`Handle::remote`].
///
/// [`Handle::remote`]: crate::Handle::remote
#[derive(Debug, Clone)]
pub struct Remote {
    queue: Arc<RemoteQueue>,
}

impl Remote {
    pub(crate) fn new(queue: Arc<RemoteQueue>) -> Self {
        Self { queue }
    }

    /// Fire the callback registered under `token`.
    ///
    /// The callback runs on the reactor thread during a later turn. Returns
    /// `false` if the reactor has already shut down.
    pub fn fire(&self, token: Token) -> bool {
        if self.queue.closed.load(Ordering::Acquire) {
            log::trace!(target: LOG, "fire.closed {:?}", token);
            return false;
        }
        self.queue.fired.lock().push(token);
        self.queue.unpark();
        true
    }
}
