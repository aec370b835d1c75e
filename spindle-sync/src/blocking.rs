use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::{Error, Gate, LoopHandle};

const LOG: &str = "spindle_sync::blocking";

const MAX_THREADS_ENV: &str = "SPINDLE_MAX_BLOCKING_THREADS";
const THREAD_NAME_ENV: &str = "SPINDLE_BLOCKING_THREAD_NAME";
const DEFAULT_THREAD_NAME: &str = "spindle-blocking";

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for a [`BlockingPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    max_threads: usize,
    thread_name: String,
}

impl Default for Config {
    /// Five threads per available core, named `spindle-blocking-N`.
    fn default() -> Self {
        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            max_threads: cores * 5,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

impl Config {
    /// Build a [`Config`] from the environment.
    ///
    /// `SPINDLE_MAX_BLOCKING_THREADS` sets the thread limit and
    /// `SPINDLE_BLOCKING_THREAD_NAME` the thread name prefix. Unset or
    /// invalid variables fall back to [`Config::default`].
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(MAX_THREADS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_threads = n,
                _ => log::warn!(
                    target: LOG,
                    "config.invalid {}={:?}, using {}",
                    MAX_THREADS_ENV,
                    raw,
                    config.max_threads
                ),
            }
        }
        if let Ok(name) = std::env::var(THREAD_NAME_ENV) {
            if !name.is_empty() {
                config.thread_name = name;
            }
        }
        config
    }

    /// Set the maximum number of pool threads.
    ///
    /// ### Panics
    /// Panics if `max_threads` is zero.
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        assert!(max_threads > 0, "max_threads must be at least 1");
        self.max_threads = max_threads;
        self
    }

    /// Set the prefix of pool thread names.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Returns the maximum number of pool threads.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Returns the prefix of pool thread names.
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }
}

/// Runs blocking closures on dedicated threads on behalf of worker contexts.
///
/// Threads are started lazily, up to the configured limit, and named
/// `<thread_name>-<n>`. They exit once the pool shuts down and the queued
/// jobs have drained.
#[derive(Debug)]
pub struct BlockingPool {
    config: Config,
    sender: Mutex<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    idle: Arc<AtomicUsize>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl BlockingPool {
    /// Create a pool. No thread is started until the first job.
    pub fn new(config: Config) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            config,
            sender: Mutex::new(Some(sender)),
            receiver,
            idle: Arc::new(AtomicUsize::new(0)),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Returns the configuration of this pool.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the number of threads started so far.
    pub fn threads(&self) -> usize {
        self.threads.lock().len()
    }

    /// Run `f` on a pool thread and suspend the calling worker until it
    /// returns.
    ///
    /// The result travels back to the reactor through a [`Remote`], which
    /// signals a [`Gate`] the worker waits on.
    ///
    /// Fails with [`ErrorKind::NotInWorker`] outside of a worker context,
    /// [`ErrorKind::Panicked`] if `f` panics and [`ErrorKind::Shutdown`] if
    /// the pool or the reactor has shut down.
    ///
    /// [`Remote`]: spindle_executor::Remote
    /// [`ErrorKind::NotInWorker`]: crate::ErrorKind::NotInWorker
    /// [`ErrorKind::Panicked`]: crate::ErrorKind::Panicked
    /// [`ErrorKind::Shutdown`]: crate::ErrorKind::Shutdown
    pub async fn run<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let reactor = LoopHandle::try_current().ok_or_else(Error::not_in_worker)?;
        let gate = Rc::new(Gate::new(reactor.clone()));
        let wait = gate.try_wait(None)?;

        let token = reactor
            .executor()
            .register({
                let gate = Rc::clone(&gate);
                move || gate.signal()
            })
            .ok_or_else(Error::shutdown)?;

        let slot: Arc<Mutex<Option<thread::Result<T>>>> = Arc::new(Mutex::new(None));
        let remote = reactor.executor().remote();
        let job: Job = Box::new({
            let slot = Arc::clone(&slot);
            move || {
                let result = panic::catch_unwind(AssertUnwindSafe(f));
                *slot.lock() = Some(result);
                remote.fire(token);
            }
        });
        if let Err(err) = self.submit(job) {
            reactor.executor().unregister(token);
            return Err(err);
        }

        wait.await;
        let result = slot.lock().take();
        match result {
            Some(Ok(value)) => Ok(value),
            Some(Err(payload)) => Err(Error::panicked(panic_message(payload.as_ref()))),
            None => Err(Error::shutdown()),
        }
    }

    /// Stop accepting jobs and wait for the pool threads to exit.
    ///
    /// Jobs already queued still run. Called automatically on drop.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);
        let threads = std::mem::take(&mut *self.threads.lock());
        log::debug!(target: LOG, "shutdown threads={}", threads.len());
        for handle in threads {
            if handle.join().is_err() {
                log::warn!(target: LOG, "shutdown.thread_panicked");
            }
        }
    }

    fn submit(&self, job: Job) -> Result<(), Error> {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(Error::shutdown());
        };
        self.maybe_spawn()?;
        sender.send(job).map_err(|_| Error::shutdown())
    }

    /// Start a thread for the next job unless an idle one can be claimed.
    ///
    /// Each idle thread is claimed by at most one job.
    fn maybe_spawn(&self) -> Result<(), Error> {
        let claimed = self
            .idle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        let mut threads = self.threads.lock();
        if claimed || threads.len() >= self.config.max_threads {
            return Ok(());
        }
        let name = format!("{}-{}", self.config.thread_name, threads.len());
        let receiver = self.receiver.clone();
        let idle = Arc::clone(&self.idle);
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(receiver, idle));
        match spawned {
            Ok(handle) => {
                log::debug!(target: LOG, "thread.spawn {}", name);
                threads.push(handle);
                Ok(())
            }
            // Another thread can still pick the job up.
            Err(err) if !threads.is_empty() => {
                log::warn!(target: LOG, "thread.spawn_failed {}: {}", name, err);
                Ok(())
            }
            Err(err) => Err(Error::spawn(err)),
        }
    }
}

impl Drop for BlockingPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// A thread announces itself idle after each job. The slot is released by
// the submitter that claims it in `maybe_spawn`.
fn worker_loop(receiver: Receiver<Job>, idle: Arc<AtomicUsize>) {
    while let Ok(job) = receiver.recv() {
        job();
        idle.fetch_add(1, Ordering::AcqRel);
    }
    log::trace!(target: LOG, "thread.exit");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
