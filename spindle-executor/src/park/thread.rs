use std::io;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use super::{Park, ParkMode, Unpark};

const LOG: &str = "spindle_executor::park::thread";

/// A [`Park`] which blocks the reactor thread on a condition variable.
///
/// This is the bottom layer of a production stack. It sleeps until
/// the requested timeout elapses or a [`ThreadUnparker`] is used.
#[derive(Debug, Default)]
pub struct ThreadPark {
    inner: Arc<Inner>,
}

/// [`Unpark`] handle for a [`ThreadPark`].
#[derive(Debug, Clone)]
pub struct ThreadUnparker {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    notified: Mutex<bool>,
    condvar: Condvar,
}

impl ThreadPark {
    /// Construct a new [`ThreadPark`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl Unpark for ThreadUnparker {
    fn unpark(&self) {
        let mut notified = self.inner.notified.lock();
        *notified = true;
        self.inner.condvar.notify_one();
    }
}

impl Park for ThreadPark {
    type Unparker = ThreadUnparker;
    type Guard = ();

    fn park(&mut self, mode: ParkMode) -> Result<(), io::Error> {
        let mut notified = self.inner.notified.lock();
        match mode {
            ParkMode::NoPark => {}
            ParkMode::NextCompletion => {
                while !*notified {
                    self.inner.condvar.wait(&mut notified);
                }
            }
            ParkMode::Timeout(timeout) => {
                log::trace!(target: LOG, "park.timeout {:?}", timeout);
                let deadline = Instant::now() + timeout;
                while !*notified {
                    if self
                        .inner
                        .condvar
                        .wait_until(&mut notified, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
            }
        }
        *notified = false;
        Ok(())
    }

    fn enter(&self) -> Self::Guard {}

    fn unparker(&self) -> Self::Unparker {
        ThreadUnparker {
            inner: Arc::clone(&self.inner),
        }
    }

    fn needs_park(&self) -> bool {
        false
    }

    fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeout_returns() {
        let mut park = ThreadPark::new();
        let start = Instant::now();
        park.park(ParkMode::Timeout(Duration::from_millis(5))).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn unpark_from_other_thread() {
        let mut park = ThreadPark::new();
        let unparker = park.unparker();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            unparker.unpark();
        });
        park.park(ParkMode::NextCompletion).unwrap();
        t.join().unwrap();
    }

    #[test]
    fn unpark_before_park_is_not_lost() {
        let mut park = ThreadPark::new();
        park.unparker().unpark();
        park.park(ParkMode::NextCompletion).unwrap();
    }
}
