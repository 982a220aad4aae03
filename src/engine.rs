//! The background engine: a dedicated thread that services registration
//! commands, reacts to filesystem wakeups, and feeds extracted lines into
//! the delivery queue consumed by the adapters.

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc as delivery;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::TailConfig;
use crate::error::{Error, Result};
use crate::reader::{AddedLine, Batch};
use crate::watch::WatchSet;

/// Lifecycle of a tail resource, as observed through its adapter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineState {
    /// Normal operation.
    Active,
    /// The previous pull observed no activity within the outer timeout.
    /// Transient; reset to `Active` on the next pull.
    WaitingTimeout,
    /// The previous pull observed an interrupt. Transient; reset to `Active`
    /// on the next pull.
    Interrupted,
    /// The resource is closed. Terminal.
    Closed,
}

/// Tagged outcome of one blocking pull from [`Tail`](crate::Tail).
///
/// Timeouts and interrupts are control signals, not errors, so the caller's
/// handling of them is exhaustive rather than string-matched.
#[derive(Debug)]
pub enum Delivery {
    /// Lines collected within one debounce window.
    Data(Batch),
    /// No activity observed within the outer timeout.
    Timeout,
    /// The interrupt handle was tripped while waiting.
    Interrupted,
}

/// Requests serviced by the engine thread.
pub(crate) enum Command {
    AddFile(PathBuf, oneshot::Sender<Result<PathBuf>>),
    Close(oneshot::Sender<()>),
}

/// Inbound messages multiplexed onto the engine's single wakeup channel:
/// filesystem notifications and adapter commands share it so the engine
/// blocks in exactly one place.
pub(crate) enum Wakeup {
    Fs,
    Command(Command),
}

/// Consumer-side handle to a running engine.
///
/// Dropping the handle detaches: the engine notices the closed delivery
/// queue within one `step` and releases its file handles, so the dropper is
/// never blocked.
pub(crate) struct EngineHandle {
    wake: mpsc::Sender<Wakeup>,
    lines: delivery::UnboundedReceiver<AddedLine>,
    thread: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    /// Registers the initial paths and spawns the engine thread.
    ///
    /// Registration failures are isolated per path and logged; construction
    /// fails only if paths were requested and every one of them failed.
    pub(crate) fn spawn(paths: Vec<PathBuf>, config: &TailConfig) -> Result<Self> {
        let (wake_tx, wake_rx) = mpsc::channel();
        let (line_tx, line_rx) = delivery::unbounded_channel();

        let mut watch = WatchSet::new(config, wake_tx.clone())?;

        let mut registered = 0;
        let mut last_err = None;
        for path in paths {
            match watch.register(path) {
                Ok(_) => registered += 1,
                Err(e) => {
                    warn!(error = %e, "skipping path that could not be registered");
                    last_err = Some(e);
                }
            }
        }
        // Partial failure is tolerated; all paths failing is not.
        if registered == 0 {
            if let Some(e) = last_err {
                return Err(e);
            }
        }

        let step = config.step_clamped();
        let thread = thread::Builder::new()
            .name("tailmux-engine".into())
            .spawn(move || run(watch, wake_rx, line_tx, step))?;

        Ok(EngineHandle {
            wake: wake_tx,
            lines: line_rx,
            thread: Some(thread),
        })
    }

    pub(crate) fn try_next(&mut self) -> std::result::Result<AddedLine, TryRecvError> {
        self.lines.try_recv()
    }

    pub(crate) async fn next(&mut self) -> Option<AddedLine> {
        self.lines.recv().await
    }

    pub(crate) fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Option<AddedLine>> {
        self.lines.poll_recv(cx)
    }

    fn request_add(&self, path: PathBuf) -> Result<oneshot::Receiver<Result<PathBuf>>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.wake
            .send(Wakeup::Command(Command::AddFile(path, ack_tx)))
            .map_err(|_| Error::Closed)?;
        Ok(ack_rx)
    }

    /// Late registration from the blocking adapter.
    pub(crate) fn add_file_blocking(&self, path: PathBuf) -> Result<PathBuf> {
        self.request_add(path)?
            .blocking_recv()
            .map_err(|_| Error::Closed)?
    }

    /// Late registration from the async adapter.
    pub(crate) async fn add_file(&self, path: PathBuf) -> Result<PathBuf> {
        self.request_add(path)?.await.map_err(|_| Error::Closed)?
    }

    /// Asks the engine to stop and joins its thread. Idempotent.
    pub(crate) fn close_blocking(&mut self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .wake
            .send(Wakeup::Command(Command::Close(ack_tx)))
            .is_ok()
        {
            let _ = ack_rx.blocking_recv();
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// The engine loop: block on the wakeup channel for up to one `step`,
/// service whatever arrived, then run a polling round. Exits when asked to
/// close or when the consumer side is gone.
fn run(
    mut watch: WatchSet,
    wake: mpsc::Receiver<Wakeup>,
    lines: delivery::UnboundedSender<AddedLine>,
    step: Duration,
) {
    'outer: loop {
        match wake.recv_timeout(step) {
            Ok(first) => {
                // Coalesce a burst of wakeups into a single scan.
                let mut next = Some(first);
                while let Some(wakeup) = next {
                    match wakeup {
                        Wakeup::Fs => {}
                        Wakeup::Command(Command::AddFile(path, ack)) => {
                            let _ = ack.send(watch.register(path));
                        }
                        Wakeup::Command(Command::Close(ack)) => {
                            let _ = ack.send(());
                            break 'outer;
                        }
                    }
                    next = wake.try_recv().ok();
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if lines.is_closed() {
            debug!("tail dropped, stopping engine");
            break;
        }

        for line in watch.scan() {
            if lines.send(line).is_err() {
                break 'outer;
            }
        }
    }
    // File handles and filesystem watches are released here.
    drop(watch);
}
