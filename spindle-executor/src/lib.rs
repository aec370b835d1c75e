//! Provides the single-threaded reactor that worker contexts run on.
//!
//! The reactor offers three services to the code running on it:
//! - worker contexts, spawned with [`Handle::spawn`],
//! - a deferred callback queue, fed with [`Handle::defer`],
//! - a thread-safe wakeup path through [`Remote`].
//!
//! Timers are provided by a [`park::Park`] layer stacked underneath the
//! executor.
//!
//! # Modules
//! - [`park`]: parking and unparking abstractions plus built-in implementations.
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::sync::Arc;

pub use spindle_task::{current as current_worker, JoinHandle, TaskError, WorkerId};

mod callbacks;
mod context;
mod harness;
/// Parking abstractions and built-in park implementations.
pub mod park;
mod remote;

pub use remote::{Remote, Token};

const LOG: &str = "spindle_executor";

/// A single-threaded reactor for driving worker contexts and callbacks.
///
/// [`LocalExecutor`] can be driven by calling [`LocalExecutor::block_on`].
pub struct LocalExecutor<P: park::Park> {
    /// Task queue contains worker contexts which are ready to be executed.
    taskqueue: spindle_task::TaskQueue,
    callbacks: Rc<callbacks::Callbacks>,
    remote: Arc<remote::RemoteQueue>,
    park: P,
}

impl<P: park::Park> std::fmt::Debug for LocalExecutor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalExecutor")
            .field("taskqueue", &self.taskqueue)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

impl<P: park::Park> LocalExecutor<P> {
    /// Construct a new [`LocalExecutor`] with the given [`park::Park`].
    ///
    /// The [`LocalExecutor`] will use the given [`park::Park`] to block the
    /// driver thread when there is no work ready to be executed.
    pub fn new(park: P) -> Self {
        let unparker = Box::new(park.unparker());
        Self {
            taskqueue: spindle_task::TaskQueue::new(),
            callbacks: Rc::new(callbacks::Callbacks::default()),
            remote: Arc::new(remote::RemoteQueue::new(unparker)),
            park,
        }
    }

    /// Returns a [`Handle`] to the [`LocalExecutor`].
    pub fn handle(&self) -> Handle {
        Handle {
            taskqueue: self.taskqueue.clone(),
            callbacks: Rc::clone(&self.callbacks),
            remote: Arc::clone(&self.remote),
        }
    }

    /// Blocks the current thread until the provided [`Future`] has completed.
    ///
    /// The future runs as the reactor's top-level context: it is not a worker,
    /// so [`current_worker`] returns `None` while it is polled. Every turn of
    /// the loop collects remote wakeups, runs the runnable workers, runs the
    /// deferred callbacks queued so far and then drives the [`park::Park`].
    ///
    /// ### Panics
    /// Panics if [`park::Park::park`] returns an error.
    pub fn block_on<F>(&mut self, fut: F) -> F::Output
    where
        F: Future,
    {
        let _g = self.enter();
        let fut = pin!(fut);
        let mut root = harness::FutureHarness::new(fut, Arc::clone(&self.remote));

        loop {
            if let Some(result) = root.try_poll() {
                return result;
            }
            for token in self.remote.drain() {
                self.callbacks.fire(token);
            }
            let mut has_remaining_tasks = false;
            while let Some(next) = self.taskqueue.next() {
                next.run();
                if self.park.needs_park() {
                    has_remaining_tasks = self.taskqueue.runnable() > 0;
                    break;
                }
            }
            let ran = self.callbacks.run_deferred();
            if ran > 0 {
                log::trace!(target: LOG, "turn.deferred {}", ran);
            }

            let mut mode = park::ParkMode::NextCompletion;
            if root.is_notified()
                || has_remaining_tasks
                || self.taskqueue.runnable() > 0
                || self.callbacks.pending() > 0
                || self.remote.has_pending()
            {
                mode = park::ParkMode::NoPark;
            }
            if let Err(err) = self.park.park(mode) {
                panic!("park failed: {err}");
            }
        }
    }

    fn enter(&self) -> (P::Guard, context::ContextGuard) {
        let g1 = self.park.enter();
        let g2 = context::Context::enter(self.handle());
        (g1, g2)
    }
}

/// A handle to a [`LocalExecutor`].
#[derive(Debug, Clone)]
pub struct Handle {
    taskqueue: spindle_task::TaskQueue,
    callbacks: Rc<callbacks::Callbacks>,
    remote: Arc<remote::RemoteQueue>,
}

impl Handle {
    /// Returns a [`Handle`] to the current [`LocalExecutor`].
    ///
    /// ### Panics
    /// This function will panic if called from outside of a [`LocalExecutor`]
    /// context.
    pub fn current() -> Self {
        context::Context::handle().expect("executor not set")
    }

    /// Returns a [`Handle`] to the current [`LocalExecutor`], if any.
    pub fn try_current() -> Option<Self> {
        context::Context::handle()
    }

    /// Spawn a [`Future`] onto the [`LocalExecutor`] as a new worker context.
    ///
    /// The spawned future will run on the thread driving the [`LocalExecutor`].
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.taskqueue.spawn(future)
    }

    /// Schedule `callback` to run on the reactor thread.
    ///
    /// The callback never runs inline. It runs in a later step of the
    /// current turn, or the next turn if deferred from another callback,
    /// and always before the reactor parks. Callbacks deferred after
    /// shutdown are dropped.
    pub fn defer<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.callbacks.defer(Box::new(callback));
    }

    /// Register `callback` to be run when its [`Token`] is fired through a
    /// [`Remote`].
    ///
    /// Returns `None` if the executor has shut down.
    pub fn register<F>(&self, callback: F) -> Option<Token>
    where
        F: FnOnce() + 'static,
    {
        self.callbacks.register(Box::new(callback))
    }

    /// Drop a registered callback without running it.
    ///
    /// Returns `false` if the token already fired or was never registered.
    pub fn unregister(&self, token: Token) -> bool {
        self.callbacks.unregister(token)
    }

    /// Returns a [`Remote`] which other threads can use to fire tokens.
    pub fn remote(&self) -> Remote {
        Remote::new(Arc::clone(&self.remote))
    }
}

/// Spawn a [`Future`] onto the current [`LocalExecutor`].
///
/// The spawned future will run on the thread driving the [`LocalExecutor`].
///
/// ### Panics
/// Panics if called from outside of a [`LocalExecutor`] context.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    Handle::current().spawn(future)
}

impl<P: park::Park> Drop for LocalExecutor<P> {
    fn drop(&mut self) {
        let _g = self.enter();
        self.taskqueue.shutdown();
        self.callbacks.shutdown();
        self.remote.close();
        self.park.shutdown();
    }
}
