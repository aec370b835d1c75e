//! Synchronization between worker contexts and the Spindle reactor.
//!
//! The central primitive is the [`Gate`], a manual-reset event that worker
//! contexts wait on and producers running on the reactor thread signal.
//! Signalling never resumes a waiter inline: every resumption is deferred
//! through the reactor's callback queue, so the producer finishes its own
//! turn first. A wait may carry a deadline, in which case the reactor's
//! timer resumes the waiter directly when it expires.
//!
//! The gate reaches the reactor through the [`Reactor`] trait. Production
//! code uses [`LoopHandle`], which combines the executor and timer handles
//! of the running loop.
//!
//! [`blocking::BlockingPool`] builds on the gate to run blocking closures on
//! dedicated threads while the calling worker stays suspended.
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]

/// Offloading blocking work to a thread pool.
pub mod blocking;
mod error;
mod gate;
mod reactor;
#[cfg(test)]
mod tests;

pub use error::{Error, ErrorKind};
pub use gate::{Gate, Wait, WaitOutcome};
pub use reactor::{LoopHandle, Reactor};
pub use spindle_executor::WorkerId;
