use std::future::Future;
use std::time::Duration;

use spindle_executor::park::{Park, ParkMode, ThreadPark, Unpark};
use spindle_executor::LocalExecutor;
use spindle_timer::{Clock, Driver};

fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

/// Run `f` on a loop whose simulated clock jumps straight to the next
/// deadline instead of sleeping.
pub fn with_simulated_loop<F, T>(f: impl FnOnce() -> F) -> T
where
    F: Future<Output = T>,
{
    init_logging();
    let clock = Clock::simulated();
    let driver = Driver::new(FastForward(clock.clone()), clock);
    let mut ex = LocalExecutor::new(driver);
    ex.block_on((f)())
}

/// Run `f` on a loop backed by the system clock and a thread park, so other
/// threads can wake it.
#[allow(dead_code)]
pub fn with_system_loop<F, T>(f: impl FnOnce() -> F) -> T
where
    F: Future<Output = T>,
{
    init_logging();
    let driver = Driver::new(ThreadPark::new(), Clock::system());
    let mut ex = LocalExecutor::new(driver);
    ex.block_on((f)())
}

struct FastForward(Clock);

#[derive(Debug, Clone, Copy)]
struct NoopUnparker;

impl Unpark for NoopUnparker {
    fn unpark(&self) {}
}

impl Park for FastForward {
    type Unparker = NoopUnparker;

    type Guard = ();

    fn park(&mut self, mode: ParkMode) -> Result<(), std::io::Error> {
        if let ParkMode::Timeout(duration) = mode {
            self.0.advance(duration);
        }
        Ok(())
    }

    fn enter(&self) -> Self::Guard {}

    fn unparker(&self) -> Self::Unparker {
        NoopUnparker
    }

    fn needs_park(&self) -> bool {
        false
    }

    fn shutdown(&mut self) {}
}

/// Let the reactor run a few turns.
///
/// Sleeping is the only way for the top-level future to hand control back
/// without a worker to wait on.
#[allow(dead_code)]
pub async fn settle() {
    spindle_timer::sleep(Duration::from_millis(1))
        .await
        .expect("timer shut down");
}
