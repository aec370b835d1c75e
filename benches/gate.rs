use std::borrow::Cow;
use std::rc::Rc;
use std::time::Duration;

use bencher::{run_tests_console, Bencher, TestDesc, TestDescAndFn, TestFn, TestOpts};
use spindle_executor::park::{Park, ParkMode, Unpark};
use spindle_executor::{spawn, LocalExecutor};
use spindle_sync::Gate;
use spindle_timer::{Clock, Driver};

/// One gate, `waiters` workers, `rounds` signal/clear cycles.
struct FanOutBench {
    waiters: usize,
    rounds: usize,
    timeout: Option<Duration>,
}

impl bencher::TDynBenchFn for FanOutBench {
    fn run(&self, b: &mut Bencher) {
        let clock = Clock::simulated();
        let driver = Driver::new(FastPark(clock.clone()), clock);
        let mut executor = LocalExecutor::new(driver);
        b.iter(|| {
            let waiters = self.waiters;
            let rounds = self.rounds;
            let timeout = self.timeout;
            executor.block_on(async move {
                for _ in 0..rounds {
                    let gate = Rc::new(Gate::current());
                    let mut handles = Vec::with_capacity(waiters);
                    for _ in 0..waiters {
                        let gate = Rc::clone(&gate);
                        handles.push(spawn(async move { gate.wait(timeout).await }));
                    }
                    // Producer runs as a deferred callback once every waiter
                    // has had a chance to register.
                    let producer = Rc::clone(&gate);
                    spindle_executor::Handle::current().defer(move || producer.signal());
                    for handle in handles {
                        handle.await.unwrap();
                    }
                    gate.clear();
                }
            })
        });
    }
}

struct FastPark(Clock);

#[derive(Debug, Clone, Copy)]
struct Unparker;

impl Unpark for Unparker {
    fn unpark(&self) {}
}

impl Park for FastPark {
    type Unparker = Unparker;

    type Guard = ();

    fn park(&mut self, mode: ParkMode) -> Result<(), std::io::Error> {
        if let ParkMode::Timeout(duration) = mode {
            self.0.advance(duration);
        }
        Ok(())
    }

    fn enter(&self) -> Self::Guard {}

    fn unparker(&self) -> Self::Unparker {
        Unparker
    }

    fn needs_park(&self) -> bool {
        false
    }

    fn shutdown(&mut self) {}
}

pub fn benches() -> Vec<TestDescAndFn> {
    let mut benches = vec![];
    for waiters in [1, 16, 256] {
        for (label, timeout) in [("none", None), ("1s", Some(Duration::from_secs(1)))] {
            benches.push(TestDescAndFn {
                desc: TestDesc {
                    name: Cow::from(format!(
                        "bench_gate_fan_out/waiters={}/timeout={}",
                        waiters, label
                    )),
                    ignore: false,
                },
                testfn: TestFn::DynBenchFn(Box::new(FanOutBench {
                    waiters,
                    rounds: 8,
                    timeout,
                })),
            });
        }
    }
    benches
}

fn main() {
    let mut test_opts = TestOpts::default();
    if let Some(arg) = std::env::args().skip(1).find(|arg| *arg != "--bench") {
        test_opts.filter = Some(arg);
    }
    run_tests_console(&test_opts, benches()).unwrap();
}
