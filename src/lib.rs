//! Multiplexed `tail -f` for text files: monitor any number of files and
//! receive newly appended lines, either as debounced batches from a blocking
//! iterator or one line at a time from an async stream.
//!
//! File changes are detected with [`notify`](https://crates.io/crates/notify)
//! where available, with stat-based polling as the always-on fallback, so
//! monitoring keeps working on filesystems without reliable notifications.
//!
//! ## Blocking batches
//!
//! ```no_run
//! use tailmux::Tail;
//!
//! fn main() -> tailmux::Result<()> {
//!     // Register some files to be tailed, whether they currently exist or not.
//!     let mut tail = Tail::new(["some/file.log", "/some/other/file.log"])?;
//!
//!     // Each iteration yields one debounced batch of (line, path) pairs.
//!     for batch in &mut tail {
//!         for line in batch? {
//!             println!("source: {}, line: {}", line.source().display(), line.line());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Async lines
//!
//! ```no_run
//! use tailmux::AsyncTail;
//!
//! #[tokio::main]
//! async fn main() -> tailmux::Result<()> {
//!     let mut tail = AsyncTail::new()?;
//!     tail.add_file("some/file.log").await?;
//!
//!     loop {
//!         let line = tail.next_line().await?;
//!         println!("source: {}, line: {}", line.source().display(), line.line());
//!     }
//! }
//! ```
//!
//! ## Caveats
//!
//! Currently, tailmux assumes that if a nonexistent file is added, its parent
//! does at least exist. This is done for performance reasons and to simplify
//! the pending-watch complexity (such as limiting recursion and fs event
//! spam). However, this may change if a need presents itself.
//!
//! Rotation handling is limited to detecting a size decrease and rereading
//! from the start of the new file; read offsets are not persisted across
//! process restarts.

mod config;
mod engine;
mod error;
mod reader;
mod stream;
mod sync;
mod watch;

pub use config::{FlushPolicy, TailConfig};
pub use engine::{Delivery, EngineState};
pub use error::{Error, Result};
pub use reader::{AddedLine, Batch};
pub use stream::AsyncTail;
pub use sync::{InterruptHandle, Tail};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
