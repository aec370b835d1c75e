use std::io;

/// Error returned from gate and blocking pool operations.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn not_in_worker() -> Self {
        Self {
            kind: ErrorKind::NotInWorker,
        }
    }

    pub(crate) fn panicked(message: String) -> Self {
        Self {
            kind: ErrorKind::Panicked(message),
        }
    }

    pub(crate) fn shutdown() -> Self {
        Self {
            kind: ErrorKind::Shutdown,
        }
    }

    pub(crate) fn spawn(err: io::Error) -> Self {
        Self {
            kind: ErrorKind::Spawn(err),
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns true if the operation was attempted outside a worker context.
    pub fn is_not_in_worker(&self) -> bool {
        matches!(self.kind, ErrorKind::NotInWorker)
    }

    /// Returns true if a blocking closure panicked.
    pub fn is_panicked(&self) -> bool {
        matches!(self.kind, ErrorKind::Panicked(_))
    }

    /// Returns true if the pool or the reactor shut down.
    pub fn is_shutdown(&self) -> bool {
        matches!(self.kind, ErrorKind::Shutdown)
    }
}

/// The kind of [`Error`].
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// The caller is not running inside a worker context.
    #[error("not called from a worker context")]
    NotInWorker,
    /// The blocking closure panicked.
    #[error("blocking task panicked: {0}")]
    Panicked(String),
    /// The blocking pool or the reactor has shut down.
    #[error("the blocking pool has shut down")]
    Shutdown,
    /// A blocking pool thread could not be started.
    #[error("failed to spawn blocking thread: {0}")]
    Spawn(#[source] io::Error),
}
