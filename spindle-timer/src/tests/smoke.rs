use std::future::Future;
use std::time::Duration;

use spindle_executor::LocalExecutor;

use super::FastPark;
use crate::clock::Clock;
use crate::{Driver, Handle};

#[test]
fn smoke() {
    let clock = Clock::simulated();
    let park = FastPark::halving(clock.clone());
    let timer = Driver::new(park, clock);
    let mut executor = LocalExecutor::new(timer);

    executor.block_on(async {
        let handle = Handle::current();
        let time = handle.clock().now();
        for _ in 0..5 {
            let sleep = handle.sleep(Duration::from_secs(1));
            sleep.await.unwrap();
        }
        let elapsed = handle.clock().now() - time;
        assert_eq!(elapsed, Duration::from_secs(5));
    });
}

#[test]
fn zero_duration() {
    let clock = Clock::simulated();
    let park = FastPark::halving(clock.clone());
    let timer = Driver::new(park, clock);
    let mut executor = LocalExecutor::new(timer);

    executor.block_on(async {
        let handle = Handle::current();
        handle.sleep(Duration::from_millis(0)).await.unwrap();
        assert_eq!(handle.pending(), 0);
    });
}

#[test]
fn sleep_in_worker() {
    let clock = Clock::simulated();
    let timer = Driver::new(FastPark::exact(clock.clone()), clock);
    let mut executor = LocalExecutor::new(timer);

    executor.block_on(async {
        let worker = spindle_executor::spawn(async {
            crate::sleep(Duration::from_millis(30)).await.unwrap();
            Handle::current().clock().now()
        });
        let start = Handle::current().clock().now();
        let woke = worker.await.unwrap();
        assert_eq!(woke - start, Duration::from_millis(30));
    });
}

#[test]
fn timeout_elapses() {
    let clock = Clock::simulated();
    let timer = Driver::new(FastPark::exact(clock.clone()), clock);
    let mut executor = LocalExecutor::new(timer);

    executor.block_on(async {
        let handle = Handle::current();
        let err = handle
            .timeout(Duration::from_millis(10), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(err.is_elapsed());

        let value = handle
            .timeout(Duration::from_millis(10), async { 7 })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(handle.pending(), 0, "completed timeouts release their timer");
    });
}

#[test]
fn dropped_sleep_is_cancelled() {
    let clock = Clock::simulated();
    let timer = Driver::new(FastPark::exact(clock.clone()), clock);
    let handle = timer.handle();

    let waker = futures_test::task::noop_waker();
    let mut cx = std::task::Context::from_waker(&waker);
    let mut sleep = Box::pin(handle.sleep(Duration::from_secs(1)));
    assert!(sleep.as_mut().poll(&mut cx).is_pending());
    assert_eq!(handle.pending(), 1);
    drop(sleep);
    assert_eq!(handle.pending(), 0);
}

#[test]
fn shutdown_fails_pending_sleep() {
    let clock = Clock::simulated();
    let timer = Driver::new(FastPark::exact(clock.clone()), clock);
    let handle = timer.handle();

    let waker = futures_test::task::noop_waker();
    let mut cx = std::task::Context::from_waker(&waker);
    let mut sleep = Box::pin(handle.sleep(Duration::from_secs(1)));
    assert!(sleep.as_mut().poll(&mut cx).is_pending());

    drop(timer);
    let std::task::Poll::Ready(Err(err)) = sleep.as_mut().poll(&mut cx) else {
        panic!("expected shutdown error");
    };
    assert!(err.is_shutdown());
}

#[test]
fn reset_rearms_sleep() {
    let clock = Clock::simulated();
    let timer = Driver::new(FastPark::exact(clock.clone()), clock);
    let mut executor = LocalExecutor::new(timer);

    executor.block_on(async {
        let handle = Handle::current();
        let start = handle.clock().now();
        let mut sleep = handle.sleep(Duration::from_millis(20));
        (&mut sleep).await.unwrap();
        sleep.reset();
        sleep.await.unwrap();
        assert_eq!(handle.clock().now() - start, Duration::from_millis(40));
    });
}
