//! Blocking adapter: debounced batch pulls over the engine's delivery
//! queue, with first-class timeout and interrupt signaling.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, warn};

use crate::config::TailConfig;
use crate::engine::{Delivery, EngineHandle, EngineState};
use crate::error::{Error, Result};
use crate::reader::{AddedLine, Batch};

/// Cloneable handle for interrupting a blocking [`Tail`] from another
/// thread, typically wired to a Ctrl-C handler.
///
/// The crate installs no process-global signal handlers itself; tripping the
/// handle is the interrupt.
#[derive(Clone, Debug)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    fn new() -> Self {
        InterruptHandle {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Trips the interrupt. The tail observes it within one `step`, even
    /// mid-wait.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Consumes a pending interrupt, so one trip surfaces exactly once.
    fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

/// Monitors files and delivers debounced batches of appended lines to a
/// blocking caller.
///
/// ## Pulling batches
///
/// [`read_next`](Tail::read_next) is the core pull operation, returning a
/// tagged [`Delivery`]. The [`Iterator`] impl wraps it into an endless
/// sequence of batches, applying the configured timeout and interrupt
/// policies.
///
/// ## Debounce policy
///
/// The debounce window is a hard ceiling anchored at the first line's
/// arrival after an idle period; later arrivals do not extend it. A batch is
/// also emitted early once a full `step` passes with no new lines, so a
/// short burst does not wait out the whole window.
///
/// Dropping a `Tail` without [`close`](Tail::close) detaches: the engine
/// thread notices within one `step` and releases its file handles on its
/// own, without blocking the dropper.
pub struct Tail {
    engine: EngineHandle,
    interrupt: InterruptHandle,
    config: TailConfig,
    state: EngineState,
    done: bool,
}

impl Tail {
    /// Starts monitoring the given paths with the default configuration.
    ///
    /// Paths that cannot be registered are skipped with a warning; an error
    /// is returned only if paths were supplied and every one of them failed.
    pub fn new<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::with_config(paths, TailConfig::default())
    }

    /// Starts monitoring the given paths with an explicit configuration.
    pub fn with_config<I, P>(paths: I, config: TailConfig) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths = paths.into_iter().map(Into::into).collect();
        let engine = EngineHandle::spawn(paths, &config)?;

        Ok(Tail {
            engine,
            interrupt: InterruptHandle::new(),
            config,
            state: EngineState::Active,
            done: false,
        })
    }

    /// Adds a file to the watch, allowing for files which do not yet exist.
    /// Idempotent per canonical path; registering an already-watched file
    /// changes nothing and duplicates nothing.
    ///
    /// Returns the canonicalized version of the path originally supplied, to
    /// match against the one carried by each delivered line.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> Result<PathBuf> {
        if self.state == EngineState::Closed {
            return Err(Error::Closed);
        }
        self.engine.add_file_blocking(path.into())
    }

    /// Returns a handle for interrupting this tail from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// The lifecycle state left behind by the most recent operation.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Blocks until one delivery is ready: a debounced batch of lines, a
    /// timeout, or an interrupt.
    ///
    /// `debounce` caps how long a batch keeps collecting after its first
    /// line; `step` is the polling granularity; `outer_timeout` bounds how
    /// long to wait with no activity at all (zero waits forever). The
    /// [`Iterator`] impl calls this with the values from [`TailConfig`].
    pub fn read_next(
        &mut self,
        debounce: Duration,
        step: Duration,
        outer_timeout: Duration,
    ) -> Result<Delivery> {
        if self.state == EngineState::Closed {
            return Err(Error::Closed);
        }
        self.state = EngineState::Active;

        let step = step.max(Duration::from_millis(1));
        let deadline = if outer_timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + outer_timeout)
        };
        let mut collected: Vec<AddedLine> = Vec::new();
        let mut ceiling: Option<Instant> = None;

        loop {
            thread::sleep(step);

            if self.interrupt.take() {
                // An interrupt discards whatever was collected so far; lines
                // arriving afterwards start a fresh batch.
                self.state = EngineState::Interrupted;
                return Ok(Delivery::Interrupted);
            }

            let before = collected.len();
            let mut disconnected = false;
            loop {
                match self.engine.try_next() {
                    Ok(line) => collected.push(line),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }

            if disconnected {
                if collected.is_empty() {
                    self.state = EngineState::Closed;
                    return Err(Error::Closed);
                }
                // Deliver what we have; the next pull reports closure.
                break;
            }

            if !collected.is_empty() {
                if collected.len() == before {
                    // The burst quiesced for a full step.
                    break;
                }
                let now = Instant::now();
                match ceiling {
                    None => ceiling = Some(now + debounce),
                    Some(max) if now > max => break,
                    Some(_) => {}
                }
            } else if let Some(deadline) = deadline {
                if Instant::now() > deadline {
                    self.state = EngineState::WaitingTimeout;
                    return Ok(Delivery::Timeout);
                }
            }
        }

        Ok(Delivery::Data(Batch::from(collected)))
    }

    /// Stops the engine thread and releases all file handles and watches.
    /// Idempotent; subsequent operations return [`Error::Closed`].
    pub fn close(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }
        self.state = EngineState::Closed;
        self.engine.close_blocking();
    }
}

impl Iterator for Tail {
    type Item = Result<Batch>;

    /// Pulls the next batch, applying the configured timeout and interrupt
    /// policies:
    ///
    /// - a timeout yields an empty batch if `yield_on_timeout` is set, and
    ///   is otherwise logged and retried;
    /// - an interrupt yields `Err(Error::Interrupted)` once if
    ///   `raise_interrupt` is set, and otherwise ends iteration with a
    ///   logged warning;
    /// - a closed engine ends iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let pulled = self.read_next(
                self.config.debounce,
                self.config.step,
                self.config.outer_timeout,
            );
            match pulled {
                Ok(Delivery::Data(batch)) => return Some(Ok(batch)),
                Ok(Delivery::Timeout) => {
                    if self.config.yield_on_timeout {
                        return Some(Ok(Batch::default()));
                    }
                    debug!("tail timed out waiting for changes, continuing");
                }
                Ok(Delivery::Interrupted) => {
                    self.done = true;
                    if self.config.raise_interrupt {
                        return Some(Err(Error::Interrupted));
                    }
                    warn!("interrupt caught, stopping tail");
                    return None;
                }
                Err(_) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
