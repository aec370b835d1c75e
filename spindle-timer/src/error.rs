/// Error returned from timer operations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(transparent)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    pub(super) fn shutdown() -> Self {
        Self {
            kind: ErrorKind::Shutdown,
        }
    }

    pub(super) fn elapsed() -> Self {
        Self {
            kind: ErrorKind::Elapsed,
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if the timer driver shut down.
    pub fn is_shutdown(&self) -> bool {
        self.kind == ErrorKind::Shutdown
    }

    /// Returns true if a [`Timeout`](crate::Timeout) deadline elapsed.
    pub fn is_elapsed(&self) -> bool {
        self.kind == ErrorKind::Elapsed
    }
}

/// The kind of timer error.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The timer driver shut down before the timer could complete.
    #[error("the timer has shut down")]
    Shutdown,
    /// The deadline elapsed before the wrapped future completed.
    #[error("deadline has elapsed")]
    Elapsed,
}
