//! Error taxonomy for tail construction and delivery.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`Tail`](crate::Tail) and [`AsyncTail`](crate::AsyncTail).
///
/// Timeouts and interrupts observed while waiting are *not* errors; they are
/// reported through [`Delivery`](crate::Delivery). The one exception is
/// [`Error::Interrupted`], which the blocking iterator raises when configured
/// with `raise_interrupt`.
#[derive(Debug, Error)]
pub enum Error {
    /// Neither the registered path nor its parent directory exists, so the
    /// file cannot be opened now or picked up later. Fatal only for that
    /// registration; other files keep being monitored.
    #[error("no such file or parent directory: {path}")]
    NotFound { path: PathBuf },

    /// The registered path names a directory, not a file.
    #[error("not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// The tail was closed, or its background thread is gone.
    #[error("tail has been closed")]
    Closed,

    /// An external interrupt was observed while waiting for lines.
    #[error("tail interrupted")]
    Interrupted,

    /// The filesystem watcher backend could not be started. Only possible
    /// during construction; once running, watch failures degrade to polling.
    #[error("failed to start filesystem watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
