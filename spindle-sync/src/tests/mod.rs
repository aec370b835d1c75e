mod gate;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use spindle_executor::WorkerId;

use crate::Reactor;

type Callback = Box<dyn FnOnce()>;

/// Hand-driven [`Reactor`]: callbacks and timers only run when the test
/// asks for them.
#[derive(Default)]
struct Inner {
    deferred: RefCell<VecDeque<Callback>>,
    timers: RefCell<BTreeMap<u64, (Duration, Callback)>>,
    cancelled: RefCell<Vec<u64>>,
    next_timer: Cell<u64>,
    worker: Cell<Option<WorkerId>>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeReactor(Rc<Inner>);

impl FakeReactor {
    /// A reactor that reports `worker` as the running worker context.
    pub(crate) fn in_worker(worker: u64) -> Self {
        let reactor = Self::default();
        reactor.0.worker.set(Some(WorkerId::new(worker)));
        reactor
    }

    pub(crate) fn deferred(&self) -> usize {
        self.0.deferred.borrow().len()
    }

    pub(crate) fn run_deferred(&self) -> usize {
        let batch = std::mem::take(&mut *self.0.deferred.borrow_mut());
        let ran = batch.len();
        for callback in batch {
            callback();
        }
        ran
    }

    pub(crate) fn timers(&self) -> Vec<(u64, Duration)> {
        self.0
            .timers
            .borrow()
            .iter()
            .map(|(id, (after, _))| (*id, *after))
            .collect()
    }

    pub(crate) fn cancelled(&self) -> Vec<u64> {
        self.0.cancelled.borrow().clone()
    }

    /// Fire a pending timer. Returns false if it is no longer pending.
    pub(crate) fn fire_timer(&self, id: u64) -> bool {
        let entry = self.0.timers.borrow_mut().remove(&id);
        match entry {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl Reactor for FakeReactor {
    type Timer = u64;

    fn defer(&self, callback: Box<dyn FnOnce()>) {
        self.0.deferred.borrow_mut().push_back(callback);
    }

    fn schedule_timer(&self, after: Duration, callback: Box<dyn FnOnce()>) -> Self::Timer {
        let id = self.0.next_timer.get();
        self.0.next_timer.set(id + 1);
        self.0.timers.borrow_mut().insert(id, (after, callback));
        id
    }

    fn cancel_timer(&self, timer: Self::Timer) {
        if self.0.timers.borrow_mut().remove(&timer).is_some() {
            self.0.cancelled.borrow_mut().push(timer);
        }
    }

    fn current_worker(&self) -> Option<WorkerId> {
        self.0.worker.get()
    }
}
