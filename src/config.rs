//! Construction parameters shared by the blocking and async tails.

use std::time::Duration;

/// What to do with a trailing line fragment that is not (yet) terminated by a
/// newline.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FlushPolicy {
    /// Deliver the fragment as soon as it is read at end-of-file. A line
    /// written without a trailing newline shows up immediately, at the cost
    /// of occasionally splitting a line the writer was still in the middle
    /// of.
    #[default]
    Eof,
    /// Hold the fragment back until a newline completes it. An unterminated
    /// fragment is never delivered; it is dropped if the tail is closed
    /// first.
    Newline,
}

/// Configuration for [`Tail`](crate::Tail) and [`AsyncTail`](crate::AsyncTail).
///
/// All fields have defaults; construct with `TailConfig::default()` and
/// override what you need.
///
/// ```
/// use std::time::Duration;
/// use tailmux::TailConfig;
///
/// let config = TailConfig {
///     debounce: Duration::from_millis(200),
///     yield_on_timeout: true,
///     ..Default::default()
/// };
/// assert_eq!(config.step, Duration::from_millis(50));
/// ```
#[derive(Clone, Debug)]
pub struct TailConfig {
    /// Ceiling on how long a batch keeps collecting after its first line
    /// arrives (blocking mode only). The window is anchored at the first
    /// arrival; later lines do not extend it.
    pub debounce: Duration,
    /// Polling granularity while waiting for changes. Clamped to at least
    /// one millisecond.
    pub step: Duration,
    /// Maximum time to wait with no activity at all before reporting a
    /// timeout. `Duration::ZERO` waits forever.
    pub outer_timeout: Duration,
    /// Whether the blocking iterator surfaces a timeout as an empty batch
    /// instead of silently retrying.
    pub yield_on_timeout: bool,
    /// Whether the blocking iterator raises `Error::Interrupted` when the
    /// interrupt handle is tripped, rather than ending iteration quietly.
    pub raise_interrupt: bool,
    /// Policy for unterminated trailing fragments.
    pub flush: FlushPolicy,
    /// Tail files that exist at registration from their beginning instead of
    /// from their current end.
    pub from_start: bool,
}

impl Default for TailConfig {
    fn default() -> Self {
        TailConfig {
            debounce: Duration::from_millis(1600),
            step: Duration::from_millis(50),
            outer_timeout: Duration::from_millis(5000),
            yield_on_timeout: false,
            raise_interrupt: true,
            flush: FlushPolicy::default(),
            from_start: false,
        }
    }
}

impl TailConfig {
    /// `step`, never below one millisecond so wait loops cannot spin.
    pub(crate) fn step_clamped(&self) -> Duration {
        self.step.max(Duration::from_millis(1))
    }
}
