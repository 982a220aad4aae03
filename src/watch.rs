//! Everything related to tracking the set of monitored files: registration,
//! growth/truncation detection, and reading newly appended bytes.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::config::{FlushPolicy, TailConfig};
use crate::engine::Wakeup;
use crate::error::{Error, Result};
use crate::reader::{AddedLine, LineBuffer};

const READ_CHUNK: usize = 8 * 1024;

/// A file under active monitoring.
struct WatchedFile {
    path: PathBuf,
    file: File,
    /// Byte position up to which the file has been read. Monotonically
    /// non-decreasing except on truncation/rotation, which resets it to 0.
    offset: u64,
    buffer: LineBuffer,
}

/// Tracks monitored paths and turns detected growth into [`AddedLine`]s.
///
/// Change notifications from [`notify`] only wake the engine early; the
/// stat-based [`scan`](WatchSet::scan) at `step` granularity is the source of
/// truth, so monitoring keeps working when a watch cannot be installed (e.g.
/// on network filesystems).
///
/// Owned exclusively by the engine thread once it is spawned; file handles
/// are held for the duration of monitoring and released when the set is
/// dropped.
pub(crate) struct WatchSet {
    watcher: RecommendedWatcher,
    /// Refcounted directory watches for pending files sharing a parent.
    watched_directories: HashMap<PathBuf, usize>,
    /// Files currently being tailed, in registration order.
    files: Vec<WatchedFile>,
    /// Files that don't exist yet; promoted once they appear.
    pending: Vec<PathBuf>,
    flush: FlushPolicy,
    from_start: bool,
}

impl WatchSet {
    /// Constructs a watch set whose change notifications are forwarded to
    /// `wake` as [`Wakeup::Fs`].
    pub(crate) fn new(config: &TailConfig, wake: Sender<Wakeup>) -> Result<Self> {
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                // Access events say nothing about content.
                if let Ok(event) = &res {
                    if event.kind.is_access() {
                        return;
                    }
                }
                // A send failure means the engine is gone; nothing to wake.
                let _ = wake.send(Wakeup::Fs);
            },
            NotifyConfig::default(),
        )?;

        Ok(WatchSet {
            watcher,
            watched_directories: HashMap::new(),
            files: Vec::new(),
            pending: Vec::new(),
            flush: config.flush,
            from_start: config.from_start,
        })
    }

    /// Registers a file for monitoring, allowing for files which do not yet
    /// exist as long as their parent directory does. Idempotent per
    /// canonical path.
    ///
    /// Returns the canonicalized version of the path originally supplied,
    /// the same one later carried by each [`AddedLine`].
    pub(crate) fn register(&mut self, path: impl Into<PathBuf>) -> Result<PathBuf> {
        let path = absolutify(path.into())?;

        if path.is_dir() {
            return Err(Error::NotAFile { path });
        }

        if self.is_registered(&path) {
            return Ok(path);
        }

        if path.exists() {
            let file = File::open(&path)?;
            let offset = if self.from_start {
                0
            } else {
                file.metadata()?.len()
            };
            self.watch_file(&path);
            self.files.push(WatchedFile {
                path: path.clone(),
                file,
                offset,
                buffer: LineBuffer::new(self.flush),
            });
        } else {
            let parent = path.parent().expect("absolutified path has a parent");
            if !parent.is_dir() {
                return Err(Error::NotFound { path });
            }
            self.watch_directory(parent.to_path_buf());
            self.pending.push(path.clone());
        }

        Ok(path)
    }

    fn is_registered(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f.path == *path) || self.pending.iter().any(|p| p == path)
    }

    /// One polling round over every registered file, in registration order.
    ///
    /// Detects growth, truncation/rotation, and deletion; promotes pending
    /// files that have appeared. Per-file I/O errors are logged and isolated
    /// so they never tear down monitoring of the other files.
    pub(crate) fn scan(&mut self) -> Vec<AddedLine> {
        let mut out = Vec::new();

        let mut i = 0;
        while i < self.files.len() {
            match Self::scan_file(&mut self.files[i], &mut out) {
                Ok(()) => i += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let stale = self.files.remove(i);
                    debug!(
                        path = %stale.path.display(),
                        "watched file removed, waiting for it to reappear"
                    );
                    let _ = self.watcher.unwatch(&stale.path);
                    if let Some(parent) = stale.path.parent() {
                        self.watch_directory(parent.to_path_buf());
                    }
                    self.pending.push(stale.path);
                }
                Err(e) => {
                    warn!(
                        path = %self.files[i].path.display(),
                        error = %e,
                        "failed to scan file"
                    );
                    i += 1;
                }
            }
        }

        // Promote pending files that now exist, and pick up anything written
        // to them since creation within the same round.
        let pending = std::mem::take(&mut self.pending);
        for path in pending {
            if !path.is_file() {
                self.pending.push(path);
                continue;
            }
            if let Some(parent) = path.parent() {
                self.unwatch_directory(parent);
            }
            match self.promote(path, &mut out) {
                Ok(()) => {}
                Err((path, e)) => {
                    warn!(path = %path.display(), error = %e, "failed to open pending file");
                    if let Some(parent) = path.parent() {
                        self.watch_directory(parent.to_path_buf());
                    }
                    self.pending.push(path);
                }
            }
        }

        out
    }

    /// Reads a watched file from its current offset to end-of-file, feeding
    /// the per-file buffer and draining completed lines.
    fn scan_file(file: &mut WatchedFile, out: &mut Vec<AddedLine>) -> io::Result<()> {
        let size = fs::metadata(&file.path)?.len();

        if size < file.offset {
            debug!(
                path = %file.path.display(),
                "file truncated or rotated, rereading from start"
            );
            file.file = File::open(&file.path)?;
            file.offset = 0;
            file.buffer.clear();
        }

        if size > file.offset {
            file.file.seek(SeekFrom::Start(file.offset))?;
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                let n = file.file.read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                file.offset += n as u64;
                file.buffer.extend(&chunk[..n]);
            }
            for line in file.buffer.drain_lines() {
                out.push(AddedLine::new(line, file.path.clone()));
            }
        }

        Ok(())
    }

    /// Moves a pending path into the tailed set, starting from offset 0 so
    /// content written since creation counts as new.
    fn promote(&mut self, path: PathBuf, out: &mut Vec<AddedLine>) -> std::result::Result<(), (PathBuf, io::Error)> {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => return Err((path, e)),
        };
        debug!(path = %path.display(), "pending file appeared, tailing from start");
        self.watch_file(&path);
        self.files.push(WatchedFile {
            path,
            file,
            offset: 0,
            buffer: LineBuffer::new(self.flush),
        });

        let idx = self.files.len() - 1;
        if let Err(e) = Self::scan_file(&mut self.files[idx], out) {
            warn!(
                path = %self.files[idx].path.display(),
                error = %e,
                "failed to scan file"
            );
        }
        Ok(())
    }

    fn watch_file(&mut self, path: &Path) {
        if let Err(e) = self.watcher.watch(path, RecursiveMode::NonRecursive) {
            warn!(
                path = %path.display(),
                error = %e,
                "could not watch file, relying on polling"
            );
        }
    }

    fn watch_directory(&mut self, path: PathBuf) {
        // Okay to call multiple times for the same directory; the refcount
        // tracks how many pending files depend on it.
        if let Err(e) = self.watcher.watch(&path, RecursiveMode::NonRecursive) {
            warn!(
                path = %path.display(),
                error = %e,
                "could not watch directory, relying on polling"
            );
        }
        *self.watched_directories.entry(path).or_insert(0) += 1;
    }

    fn unwatch_directory(&mut self, path: &Path) {
        match self.watched_directories.get_mut(path) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.watched_directories.remove(path);
                let _ = self.watcher.unwatch(path);
            }
            None => {}
        }
    }
}

/// Resolves a path to an absolute, symlink-free form without requiring the
/// file itself to exist: the parent directory is canonicalized and the
/// filename joined back on.
fn absolutify(path: PathBuf) -> io::Result<PathBuf> {
    let parent = match path.parent() {
        Some(p) if p != Path::new("") => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let filename = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "filename not found in path"))?
        .to_os_string();

    let parent = parent.read_link().unwrap_or(parent);
    let parent = parent.canonicalize().unwrap_or(parent);

    Ok(parent.join(filename))
}
