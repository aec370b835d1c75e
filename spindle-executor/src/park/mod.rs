//! Contains the [`Park`] and [`Unpark`] traits.
//!
//! The [`LocalExecutor`] hands the thread to a [`Park`] whenever it runs
//! out of runnable tasks and deferred callbacks. Layers such as the timer
//! driver wrap an inner [`Park`], process their own events (expired timers),
//! and then pass control further down until the bottom layer blocks the
//! thread.
//!
//! [`LocalExecutor`]: crate::LocalExecutor
//! [`Park`]: crate::park::Park
//! [`Unpark`]: crate::park::Unpark
use std::io;
use std::sync::Arc;
use std::time::Duration;

mod spin;
mod thread;

pub use spin::SpinPark;
pub use thread::{ThreadPark, ThreadUnparker};

/// Indicates under what conditions a [`Park`] operation
/// should return.
///
/// Note it is always valid to return from a [`Park`] operation
/// early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkMode {
    /// The [`Park`] operation should return immediately.
    NoPark,

    /// The [`Park`] operation should return when there is
    /// some new work for the reactor, such as an expired timer
    /// or a remote wakeup.
    NextCompletion,

    /// The [`Park`] operation should return before the
    /// specified duration has elapsed.
    Timeout(Duration),
}

/// A layer the reactor passes control to when it is out of work.
///
/// As each layer exhausts the work it can perform, it calls
/// [`Park::park`] on the layer below it. The [`ParkMode`] tells
/// every layer how long it may hold on to the thread.
///
/// ## Unparker
///
/// The [`Park::unparker`] method returns a [`Unpark`] that
/// other threads use to cut a blocking park short.
pub trait Park {
    /// The [`Park::Unparker`] associated with this [`Park`] instance.
    type Unparker: Unpark + Clone + Send + Sync + 'static;

    /// The [`Park::Guard`] associated with this [`Park`] instance.
    ///
    /// Guards are held for as long as the reactor is running and are
    /// the place to install thread-local handles.
    type Guard;

    /// Trigger a park operation, passing control to the next layer.
    ///
    /// Layers must respect the [`ParkMode`] passed to this method.
    fn park(&mut self, mode: ParkMode) -> Result<(), io::Error>;

    /// Get a [`Park::Guard`] for this [`Park`] instance.
    ///
    /// This will be called before any calls to [`Park::park`].
    fn enter(&self) -> Self::Guard;

    /// Returns an unparker associated with this [`Park`] instance.
    fn unparker(&self) -> Self::Unparker;

    /// Hints that a lower layer wants the thread back before the run
    /// queue is empty.
    ///
    /// This is checked after every task poll and must be cheap.
    fn needs_park(&self) -> bool;

    /// Shutdown the park layer.
    ///
    /// Services of the layer must not be used after shutdown.
    fn shutdown(&mut self);
}

/// The [`Unpark`] trait provides a way to force a wakeup
/// of a thread which is blocked in a [`Park::park`] operation.
pub trait Unpark {
    /// Unpark the associated [`Park`] instance.
    fn unpark(&self);
}

impl<T> Unpark for &T
where
    T: Unpark + ?Sized,
{
    fn unpark(&self) {
        (**self).unpark()
    }
}

impl<T> Unpark for Arc<T>
where
    T: Unpark + ?Sized,
{
    fn unpark(&self) {
        (**self).unpark()
    }
}
