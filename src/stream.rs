//! Async adapter: per-line delivery with no debouncing, bridging the
//! engine's background thread into a cooperative scheduler.

use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream as FuturesStream;

use crate::config::TailConfig;
use crate::engine::EngineHandle;
use crate::error::{Error, Result};
use crate::reader::AddedLine;

/// Monitors files and delivers appended lines one at a time to an async
/// consumer, as soon as they are extracted.
///
/// The blocking watch loop runs on the engine's own thread, never on the
/// caller's scheduler; [`next_line`](AsyncTail::next_line) merely suspends
/// on the delivery queue and resumes exactly once per line, preserving
/// arrival order. `AsyncTail` also implements [`futures::Stream`].
///
/// Cancellation is host-native: drop the pending future or the `AsyncTail`
/// itself, and the engine thread releases its file handles within one
/// `step` without blocking the cancelling task.
///
/// [`futures::Stream`]: https://docs.rs/futures/0.3/futures/stream/trait.Stream.html
pub struct AsyncTail {
    engine: EngineHandle,
}

impl AsyncTail {
    /// Constructs an `AsyncTail` with the default configuration and no
    /// files; register them with [`add_file`](AsyncTail::add_file).
    pub fn new() -> Result<Self> {
        Self::with_config(TailConfig::default())
    }

    /// Constructs an `AsyncTail` with an explicit configuration. Only the
    /// engine-side fields (`step`, `flush`, `from_start`) apply; the
    /// debounce and timeout fields are blocking-mode concerns.
    pub fn with_config(config: TailConfig) -> Result<Self> {
        Ok(AsyncTail {
            engine: EngineHandle::spawn(Vec::new(), &config)?,
        })
    }

    /// Adds a file to the watch, allowing for files which do not yet exist.
    /// Idempotent per canonical path, and safe to call before or after
    /// consumption has begun; lines already queued from other files are
    /// unaffected.
    ///
    /// Returns the canonicalized version of the path originally supplied, to
    /// match against the one carried by each delivered line.
    pub async fn add_file(&mut self, path: impl Into<PathBuf>) -> Result<PathBuf> {
        self.engine.add_file(path.into()).await
    }

    /// Suspends until the next appended line is available.
    ///
    /// Returns [`Error::Closed`] if the engine is gone.
    pub async fn next_line(&mut self) -> Result<AddedLine> {
        self.engine.next().await.ok_or(Error::Closed)
    }
}

impl FuturesStream for AsyncTail {
    type Item = AddedLine;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.engine.poll_next(cx)
    }
}
