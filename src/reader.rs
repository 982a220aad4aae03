//! Line extraction from newly appended bytes, and the value types delivered
//! to consumers.

use std::path::{Path, PathBuf};
use std::slice::Iter;

use tracing::warn;

use crate::config::FlushPolicy;

/// A single line captured from a monitored file.
///
/// Immutable once produced: the decoded line content (without its trailing
/// newline) plus the canonicalized path it was read from.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AddedLine {
    line: String,
    source: PathBuf,
}

impl AddedLine {
    pub(crate) fn new(line: String, source: PathBuf) -> Self {
        AddedLine { line, source }
    }

    /// Returns the captured line, without its line terminator.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Returns the path of the file the line was read from.
    pub fn source(&self) -> &Path {
        self.source.as_path()
    }

    /// Returns the line and source path by value.
    pub fn into_inner(self) -> (String, PathBuf) {
        let AddedLine { line, source } = self;

        (line, source)
    }
}

/// An ordered batch of lines collected within one debounce window.
///
/// Order reflects detection order: registration order across files within a
/// polling round, write order within a file. May be empty when a timeout is
/// surfaced with `yield_on_timeout`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Batch {
    lines: Vec<AddedLine>,
}

impl Batch {
    /// Returns an iterator over the lines in the batch.
    pub fn iter(&self) -> Iter<AddedLine> {
        self.lines.iter()
    }

    /// Returns the number of lines in the batch.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if the batch contains no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the underlying vec of lines.
    pub fn into_inner(self) -> Vec<AddedLine> {
        self.lines
    }
}

impl From<Vec<AddedLine>> for Batch {
    fn from(lines: Vec<AddedLine>) -> Self {
        Batch { lines }
    }
}

impl IntoIterator for Batch {
    type Item = AddedLine;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a AddedLine;
    type IntoIter = Iter<'a, AddedLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

/// Per-file accumulation buffer that turns raw appended bytes into complete
/// lines.
///
/// Bytes go in via [`extend`](LineBuffer::extend) as they are read; complete
/// lines come out via [`drain_lines`](LineBuffer::drain_lines). Whatever is
/// left after the last newline stays buffered for the next read, subject to
/// the configured [`FlushPolicy`].
#[derive(Debug)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
    flush: FlushPolicy,
}

impl LineBuffer {
    pub(crate) fn new(flush: FlushPolicy) -> Self {
        LineBuffer {
            buf: Vec::new(),
            flush,
        }
    }

    /// Appends newly read bytes to the buffer.
    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Discards any buffered partial line, e.g. on rotation.
    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    /// Splits off the completed lines accumulated so far.
    ///
    /// Under [`FlushPolicy::Eof`] a trailing unterminated fragment is yielded
    /// as the final line and the buffer emptied; under
    /// [`FlushPolicy::Newline`] it is retained for the next extraction.
    pub(crate) fn drain_lines(&mut self) -> DrainLines<'_> {
        DrainLines { inner: self }
    }
}

/// Lazy, finite iterator over the lines currently completed in a
/// [`LineBuffer`].
pub(crate) struct DrainLines<'a> {
    inner: &'a mut LineBuffer,
}

impl Iterator for DrainLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let buf = &mut self.inner.buf;

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let mut segment: Vec<u8> = buf.drain(..=pos).collect();
            segment.pop(); // the newline itself
            if segment.last() == Some(&b'\r') {
                segment.pop();
            }
            return Some(decode(segment));
        }

        if self.inner.flush == FlushPolicy::Eof && !buf.is_empty() {
            let rest = std::mem::take(buf);
            return Some(decode(rest));
        }

        None
    }
}

/// Decodes raw line bytes, recovering from invalid UTF-8 with lossy
/// replacement rather than failing.
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => {
            warn!("line is not valid utf-8, decoding lossily");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}
