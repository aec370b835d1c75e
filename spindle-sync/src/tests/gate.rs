use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_test::task::{new_count_waker, noop_context};

use super::FakeReactor;
use crate::{ErrorKind, Gate, WaitOutcome};

#[test]
fn signaled_gate_does_not_suspend() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor.clone());
    gate.signal();
    assert!(gate.is_signaled());

    let mut wait = gate.wait(None);
    let poll = Pin::new(&mut wait).poll(&mut noop_context());
    assert_eq!(poll, Poll::Ready(WaitOutcome::Signaled));
    assert_eq!(gate.waiters(), 0);
    assert_eq!(reactor.deferred(), 0);
}

#[test]
fn signal_defers_resumption() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor.clone());
    let (waker, count) = new_count_waker();
    let mut cx = Context::from_waker(&waker);

    let mut wait = gate.wait(None);
    assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
    assert_eq!(gate.waiters(), 1);

    gate.signal();
    assert_eq!(count.get(), 0, "signal must not wake inline");
    assert_eq!(gate.waiters(), 0);
    assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());

    assert_eq!(reactor.run_deferred(), 1);
    assert_eq!(count.get(), 1);
    assert_eq!(
        Pin::new(&mut wait).poll(&mut cx),
        Poll::Ready(WaitOutcome::Signaled)
    );
}

#[test]
fn every_waiter_resumes_once() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor.clone());
    let (waker, count) = new_count_waker();
    let mut cx = Context::from_waker(&waker);

    let mut waits: Vec<_> = (0..3).map(|_| gate.wait(None)).collect();
    for wait in waits.iter_mut() {
        assert!(Pin::new(wait).poll(&mut cx).is_pending());
    }
    assert_eq!(gate.waiters(), 3);

    gate.signal();
    gate.signal();
    assert_eq!(reactor.run_deferred(), 3);
    assert_eq!(reactor.run_deferred(), 0);
    assert_eq!(count.get(), 3);
    for wait in waits.iter_mut() {
        assert_eq!(
            Pin::new(wait).poll(&mut cx),
            Poll::Ready(WaitOutcome::Signaled)
        );
    }
}

#[test]
fn clear_rearms_the_gate() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor.clone());
    gate.signal();
    gate.clear();
    assert!(!gate.is_signaled());

    let mut wait = gate.wait(None);
    assert!(Pin::new(&mut wait).poll(&mut noop_context()).is_pending());
    assert_eq!(gate.waiters(), 1);

    gate.clear();
    assert_eq!(gate.waiters(), 1, "clear leaves waiters suspended");
}

#[test]
fn timeout_resumes_directly() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor.clone());
    let (waker, count) = new_count_waker();
    let mut cx = Context::from_waker(&waker);

    let mut wait = gate.wait(Some(Duration::from_millis(10)));
    assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
    assert_eq!(gate.pending_timeouts(), 1);
    let timers = reactor.timers();
    assert_eq!(timers, vec![(0, Duration::from_millis(10))]);

    assert!(reactor.fire_timer(0));
    assert_eq!(count.get(), 1, "timeout wakes without deferring");
    assert_eq!(reactor.deferred(), 0);
    assert_eq!(gate.waiters(), 0);
    assert_eq!(gate.pending_timeouts(), 0);
    assert_eq!(
        Pin::new(&mut wait).poll(&mut cx),
        Poll::Ready(WaitOutcome::TimedOut)
    );
    assert!(!gate.is_signaled());
}

#[test]
fn signal_cancels_pending_timeouts() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor.clone());
    let (waker, count) = new_count_waker();
    let mut cx = Context::from_waker(&waker);

    let mut wait = gate.wait(Some(Duration::from_secs(1)));
    assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());

    gate.signal();
    assert_eq!(reactor.cancelled(), vec![0]);
    assert!(reactor.timers().is_empty());
    assert_eq!(gate.pending_timeouts(), 0);

    reactor.run_deferred();
    assert_eq!(count.get(), 1);
    assert_eq!(
        Pin::new(&mut wait).poll(&mut cx),
        Poll::Ready(WaitOutcome::Signaled)
    );
}

#[test]
fn timeout_only_removes_its_own_waiter() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor.clone());
    let mut cx = noop_context();

    let mut short = gate.wait(Some(Duration::from_millis(5)));
    let mut forever = gate.wait(None);
    assert!(Pin::new(&mut short).poll(&mut cx).is_pending());
    assert!(Pin::new(&mut forever).poll(&mut cx).is_pending());

    reactor.fire_timer(0);
    assert_eq!(gate.waiters(), 1);
    assert_eq!(
        Pin::new(&mut short).poll(&mut cx),
        Poll::Ready(WaitOutcome::TimedOut)
    );

    gate.signal();
    reactor.run_deferred();
    assert_eq!(
        Pin::new(&mut forever).poll(&mut cx),
        Poll::Ready(WaitOutcome::Signaled)
    );
}

#[test]
fn dropped_wait_deregisters() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor.clone());

    let mut wait = gate.wait(Some(Duration::from_secs(1)));
    assert!(Pin::new(&mut wait).poll(&mut noop_context()).is_pending());
    drop(wait);

    assert_eq!(gate.waiters(), 0);
    assert_eq!(gate.pending_timeouts(), 0);
    assert_eq!(reactor.cancelled(), vec![0]);
}

#[test]
fn dropped_wait_ignores_queued_resumption() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor.clone());
    let (waker, count) = new_count_waker();
    let mut cx = Context::from_waker(&waker);

    let mut wait = gate.wait(None);
    assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
    gate.signal();
    drop(wait);

    assert_eq!(reactor.run_deferred(), 1);
    assert_eq!(count.get(), 0);
}

#[test]
#[should_panic(expected = "worker context")]
fn wait_outside_worker_panics() {
    let reactor = FakeReactor::default();
    let gate = Gate::new(reactor);
    let mut wait = gate.wait(None);
    let _ = Pin::new(&mut wait).poll(&mut noop_context());
}

#[test]
fn try_wait_outside_worker() {
    let reactor = FakeReactor::default();
    let gate = Gate::new(reactor);
    let err = gate.try_wait(None).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotInWorker));
    assert!(err.is_not_in_worker());
}

#[test]
fn gate_debug_reports_bookkeeping() {
    let reactor = FakeReactor::in_worker(1);
    let gate = Gate::new(reactor);
    let mut wait = gate.wait(Some(Duration::from_millis(1)));
    assert!(Pin::new(&mut wait).poll(&mut noop_context()).is_pending());
    let debug = format!("{:?}", gate);
    assert!(debug.contains("waiters: 1"), "{debug}");
    assert!(debug.contains("pending_timeouts: 1"), "{debug}");
}
