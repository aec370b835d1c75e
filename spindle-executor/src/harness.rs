use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crate::remote::RemoteQueue;

/// Drives the root future passed to [`LocalExecutor::block_on`].
///
/// The root future is polled only after its waker fires. It is the
/// reactor's top-level context and never counts as a worker.
///
/// [`LocalExecutor::block_on`]: crate::LocalExecutor::block_on
pub(crate) struct FutureHarness<'a, F> {
    future: Pin<&'a mut F>,
    root: Arc<RootWaker>,
    waker: Waker,
}

struct RootWaker {
    notified: AtomicBool,
    remote: Arc<RemoteQueue>,
}

impl Wake for RootWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.notified.store(true, Ordering::Release);
        self.remote.unpark();
    }
}

impl<'a, F> FutureHarness<'a, F>
where
    F: Future,
{
    pub(crate) fn new(future: Pin<&'a mut F>, remote: Arc<RemoteQueue>) -> Self {
        let root = Arc::new(RootWaker {
            notified: AtomicBool::new(true),
            remote,
        });
        let waker = Waker::from(Arc::clone(&root));
        Self {
            future,
            root,
            waker,
        }
    }

    /// Polls the root future if it has been notified since the last poll.
    pub(crate) fn try_poll(&mut self) -> Option<F::Output> {
        if !self.root.notified.swap(false, Ordering::AcqRel) {
            return None;
        }
        let mut cx = Context::from_waker(&self.waker);
        match self.future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => Some(output),
            Poll::Pending => None,
        }
    }

    pub(crate) fn is_notified(&self) -> bool {
        self.root.notified.load(Ordering::Acquire)
    }
}
