//! Cooperative worker contexts for a single-threaded reactor.
//!
//! A worker context is a spawned [Future] stored in a single reference counted
//! allocation. It yields to the reactor by returning [`Poll::Pending`] and is
//! resumed when its [`Waker`] is woken, which places it back on the run queue
//! of the [`TaskQueue`] that spawned it.
//!
//! [`spindle_task`] is orientated towards the use case of a single-threaded event loop. Futures
//! cannot be moved, polled, or woken from other threads.
//!
//! # Components
//! - [`TaskQueue`]: spawn and run local tasks from a run queue.
//! - [`JoinHandle`]: awaitable task result handle.
//! - [`Runnable`]: a queued task ready to be polled.
//! - [`current`]: identifies the worker context currently being polled.
//!
//! [Future]: std::future::Future
//! [`Poll::Pending`]: std::task::Poll::Pending
//! [`Waker`]: std::task::Waker
//! [`spindle_task`]: crate
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
mod cell;
mod context;
mod error;
mod join;
mod state;
mod taskqueue;


pub use cell::WorkerId;
pub use context::current;
pub use error::TaskError;
pub use join::JoinHandle;
pub use taskqueue::{Runnable, TaskQueue};
