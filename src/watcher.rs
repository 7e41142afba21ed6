//! Incremental reading of the followed file.
//!
//! [`FileCursor`] owns the open handle, the byte offset of the last consumed
//! byte and any partial trailing line. At end of data it can tell whether
//! the path was rotated, truncated or removed. [`ChangeWatcher`] uses
//! `notify` to wake the stream early when the file's directory changes.
//!
//! Key behaviours:
//! - Lines are byte strings; invalid UTF-8 passes through untouched
//! - A partial last line is held back in follow mode until completed
//! - Rotation is detected by device/inode on unix

use std::ffi::{OsStr, OsString};
use std::fs::{self, File, Metadata};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::cli::ResumePolicy;
use crate::error::StreamError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Longest line held in memory. Longer lines are emitted in pieces of this
/// size, only the last one carrying the terminator.
pub const MAX_PENDING_LINE_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete line, terminator included when the file had one.
    Line(Vec<u8>),
    /// No complete line available yet.
    Empty,
}

/// What happened to the path since it was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Unchanged,
    Rotated,
    Truncated,
    Missing,
}

// ---------------------------------------------------------------------------
// FileIdentity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    pub fn of(meta: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn of(_meta: &Metadata) -> Option<Self> {
        None
    }
}

// ---------------------------------------------------------------------------
// FileCursor
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FileCursor {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    identity: Option<FileIdentity>,
    pending: Vec<u8>,
}

impl FileCursor {
    pub fn open(path: &Path) -> Result<Self, StreamError> {
        let file = File::open(path).map_err(|e| StreamError::from_open(path.to_path_buf(), e))?;
        let meta = file.metadata().map_err(|e| io_failure(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            offset: 0,
            identity: FileIdentity::of(&meta),
            pending: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed from the current handle.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn identity(&self) -> Option<FileIdentity> {
        self.identity
    }

    /// Read the next complete line.
    ///
    /// Without `follow`, a final line lacking a terminator is returned as
    /// soon as the end is reached. With `follow` it stays pending until the
    /// terminator arrives. Either way no more than [`MAX_PENDING_LINE_BYTES`]
    /// are buffered: a longer line comes back in pieces.
    pub fn read_line(&mut self, follow: bool) -> Result<ReadOutcome, StreamError> {
        let budget = MAX_PENDING_LINE_BYTES.saturating_sub(self.pending.len()) as u64;
        let n = (&mut self.reader)
            .take(budget)
            .read_until(b'\n', &mut self.pending)
            .map_err(|e| io_failure(&self.path, e))?;
        self.offset += n as u64;

        if self.pending.ends_with(b"\n") {
            return Ok(ReadOutcome::Line(std::mem::take(&mut self.pending)));
        }
        if self.pending.len() >= MAX_PENDING_LINE_BYTES {
            log::warn!(
                "{}: line exceeds {} bytes, emitting it in pieces",
                self.path.display(),
                MAX_PENDING_LINE_BYTES
            );
            return Ok(ReadOutcome::Line(std::mem::take(&mut self.pending)));
        }

        // Stopped short of both the newline and the budget: the handle is drained.
        if self.pending.is_empty() {
            return Ok(ReadOutcome::Empty);
        }
        if !follow {
            return Ok(ReadOutcome::Line(std::mem::take(&mut self.pending)));
        }
        Ok(ReadOutcome::Empty)
    }

    /// Hand out the partial line, if any.
    pub fn take_pending(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// Classify the path after the handle reported end of data.
    ///
    /// Bytes still unread through the old handle always come first, so a
    /// rotated file is drained before the new one is opened.
    pub fn detect_change(&self) -> Result<FileChange, StreamError> {
        let handle_len = self
            .reader
            .get_ref()
            .metadata()
            .map_err(|e| io_failure(&self.path, e))?
            .len();
        if handle_len > self.offset {
            return Ok(FileChange::Unchanged);
        }

        let current = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileChange::Missing),
            Err(e) => return Err(io_failure(&self.path, e)),
        };
        if let (Some(opened), Some(now)) = (self.identity, FileIdentity::of(&current)) {
            if opened != now {
                return Ok(FileChange::Rotated);
            }
        }
        if handle_len < self.offset {
            return Ok(FileChange::Truncated);
        }
        Ok(FileChange::Unchanged)
    }

    /// Reopen the path, starting at the beginning or the end. Any pending
    /// bytes are dropped; take them first if they matter.
    pub fn reopen(&mut self, policy: ResumePolicy) -> Result<(), StreamError> {
        let mut fresh = Self::open(&self.path)?;
        if policy == ResumePolicy::End {
            fresh.offset = fresh
                .reader
                .seek(SeekFrom::End(0))
                .map_err(|e| io_failure(&self.path, e))?;
        }
        *self = fresh;
        Ok(())
    }
}

fn io_failure(path: &Path, source: io::Error) -> StreamError {
    StreamError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// ChangeWatcher
// ---------------------------------------------------------------------------

/// Filesystem notifications for a single file.
///
/// Watches the parent directory so that rotation and re-creation are seen.
/// Notifications only shorten the stream's wait; polling stays in charge.
pub struct ChangeWatcher {
    _watcher: notify::RecommendedWatcher,
    rx: mpsc::Receiver<()>,
}

impl ChangeWatcher {
    pub fn start(path: &Path) -> Result<Self, notify::Error> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name: Option<OsString> = path.file_name().map(OsStr::to_os_string);

        let (tx, rx) = mpsc::channel(1);
        let mut watcher = notify::RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if is_relevant(&event, file_name.as_deref()) {
                        // A wakeup already queued is as good as a new one.
                        let _ = tx.try_send(());
                    }
                }
                Err(e) => log::debug!("notify error: {}", e),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        log::debug!("watching {} for changes", dir.display());

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Resolve on the next relevant notification. Never resolves once the
    /// underlying watcher is gone.
    pub async fn changed(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

fn is_relevant(event: &Event, file_name: Option<&OsStr>) -> bool {
    let kind_matters = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    );
    kind_matters && event.paths.iter().any(|p| p.file_name() == file_name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
