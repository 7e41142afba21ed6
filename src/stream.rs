//! The file stream: reads the target line by line, renders each line and
//! writes it out. In follow mode it keeps waiting for appended data.
//!
//! ```text
//! Opening ──> Reading <──> AtEof ──> Closed(EndOfFile)       (no follow)
//!                │            └────> Closed(Interrupted)     (signal)
//!                └─────────────────> Closed(OutputClosed)    (broken pipe)
//! ```
//!
//! Opening failures and read errors surface as [`StreamError`]. Waiting at
//! end of data is the only point where the stream yields to the runtime:
//! it sleeps on a doubling poll interval, woken early by filesystem
//! notifications or the shutdown signal.
//!
//! Piped input goes through [`pipe`] instead: the same render loop, without
//! rotation checks, ending at end of data.

use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cli::ResumePolicy;
use crate::config::AppConfig;
use crate::error::StreamError;
use crate::matcher::MatcherPipeline;
use crate::render::LineRenderer;
use crate::scheme::Scheme;
use crate::watcher::{ChangeWatcher, FileChange, FileCursor, ReadOutcome, MAX_PENDING_LINE_BYTES};

/// Piped output is flushed once input has been quiet this long.
const PIPE_IDLE_FLUSH: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Where lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Stdin,
}

impl Input {
    /// `-` names standard input, and so does a missing path when stdin is
    /// not a terminal. `None` means there is nothing to read.
    pub fn select(file: Option<&Path>, stdin_is_terminal: bool) -> Option<Input> {
        match file {
            Some(path) if path == Path::new("-") => Some(Input::Stdin),
            Some(path) => Some(Input::File(path.to_path_buf())),
            None if !stdin_is_terminal => Some(Input::Stdin),
            None => None,
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::File(path) => write!(f, "{}", path.display()),
            Input::Stdin => f.write_str("standard input"),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub follow: bool,
    pub resume: ResumePolicy,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
}

impl StreamSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let poll_interval = Duration::from_millis(config.follow_mode.poll_interval_ms.max(1));
        let max_poll_interval =
            Duration::from_millis(config.follow_mode.max_poll_interval_ms).max(poll_interval);
        Self {
            follow: config.follow,
            resume: config.follow_mode.on_rotate,
            poll_interval,
            max_poll_interval,
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Why a stream ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    EndOfFile,
    Interrupted,
    OutputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Reading,
    AtEof,
    Closed(Termination),
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Poll delay that doubles while the file stays idle.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: initial,
        }
    }

    /// The delay to wait now; the following one is doubled up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once triggered. Never resolves if the trigger is dropped
    /// without firing.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Fire `trigger` on SIGINT or SIGTERM (Ctrl-C elsewhere).
pub fn spawn_signal_listener(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        log::debug!("signal received, shutting down");
        trigger.trigger();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        _ => {
            log::warn!("cannot install signal handlers");
            return std::future::pending().await;
        }
    };
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        log::warn!("cannot install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// FileStream
// ---------------------------------------------------------------------------

pub struct FileStream<'a, W: Write> {
    settings: &'a StreamSettings,
    renderer: &'a LineRenderer,
    out: W,
    cursor: FileCursor,
    backoff: Backoff,
    changes: Option<ChangeWatcher>,
    shutdown: Shutdown,
}

impl<'a, W: Write> FileStream<'a, W> {
    /// Open `path`. Nothing is written if this fails.
    pub fn open(
        path: &Path,
        settings: &'a StreamSettings,
        renderer: &'a LineRenderer,
        out: W,
        shutdown: Shutdown,
    ) -> Result<Self, StreamError> {
        let cursor = FileCursor::open(path)?;
        log::debug!("opened {} ({:?})", path.display(), cursor.identity());

        let changes = if settings.follow {
            match ChangeWatcher::start(path) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    log::info!("file notifications unavailable ({}), polling only", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            settings,
            renderer,
            out,
            cursor,
            backoff: Backoff::new(settings.poll_interval, settings.max_poll_interval),
            changes,
            shutdown,
        })
    }

    /// Drive the stream to completion.
    pub async fn run(mut self) -> Result<Termination, StreamError> {
        let mut state = StreamState::Reading;
        loop {
            state = match state {
                StreamState::Reading => self.read_next()?,
                StreamState::AtEof => self.wait_at_eof().await?,
                StreamState::Closed(termination) => {
                    self.close(termination)?;
                    log::debug!("stream closed: {:?}", termination);
                    return Ok(termination);
                }
            };
        }
    }

    fn read_next(&mut self) -> Result<StreamState, StreamError> {
        if self.shutdown.is_triggered() {
            return Ok(StreamState::Closed(Termination::Interrupted));
        }
        match self.cursor.read_line(self.settings.follow)? {
            ReadOutcome::Line(line) => {
                self.backoff.reset();
                let rendered = self.renderer.render_line(&line);
                output_status(self.out.write_all(&rendered), StreamState::Reading)
            }
            ReadOutcome::Empty => output_status(self.out.flush(), StreamState::AtEof),
        }
    }

    async fn wait_at_eof(&mut self) -> Result<StreamState, StreamError> {
        if !self.settings.follow {
            return Ok(StreamState::Closed(Termination::EndOfFile));
        }

        match self.cursor.detect_change()? {
            change @ (FileChange::Rotated | FileChange::Truncated) => {
                log::info!(
                    "{} was {}, reopening",
                    self.cursor.path().display(),
                    if change == FileChange::Rotated {
                        "rotated"
                    } else {
                        "truncated"
                    }
                );
                if let Some(rest) = self.cursor.take_pending() {
                    let rendered = self.renderer.render_line(&rest);
                    if let StreamState::Closed(t) =
                        output_status(self.out.write_all(&rendered), StreamState::Reading)?
                    {
                        return Ok(StreamState::Closed(t));
                    }
                }
                self.cursor.reopen(self.settings.resume)?;
                self.backoff.reset();
                return Ok(StreamState::Reading);
            }
            FileChange::Missing => {
                log::debug!("{} is missing, waiting", self.cursor.path().display());
            }
            FileChange::Unchanged => {}
        }

        let delay = self.backoff.next_delay();
        tokio::select! {
            _ = self.shutdown.triggered() => Ok(StreamState::Closed(Termination::Interrupted)),
            _ = wait_for_change(self.changes.as_mut()) => Ok(StreamState::Reading),
            _ = tokio::time::sleep(delay) => Ok(StreamState::Reading),
        }
    }

    fn close(&mut self, termination: Termination) -> Result<(), StreamError> {
        if termination == Termination::OutputClosed {
            return Ok(());
        }
        if termination == Termination::Interrupted {
            if let Some(rest) = self.cursor.take_pending() {
                let rendered = self.renderer.render_line(&rest);
                if output_status(self.out.write_all(&rendered), StreamState::Reading)?
                    != StreamState::Reading
                {
                    return Ok(());
                }
            }
        }
        output_status(self.out.flush(), StreamState::Reading).map(|_| ())
    }
}

async fn wait_for_change(changes: Option<&mut ChangeWatcher>) {
    match changes {
        Some(watcher) => watcher.changed().await,
        None => std::future::pending::<()>().await,
    }
}

/// A broken pipe ends the stream quietly; any other write error is fatal.
fn output_status(result: io::Result<()>, next: StreamState) -> Result<StreamState, StreamError> {
    match result {
        Ok(()) => Ok(next),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            Ok(StreamState::Closed(Termination::OutputClosed))
        }
        Err(e) => Err(StreamError::Output(e)),
    }
}

// ---------------------------------------------------------------------------
// Piped input
// ---------------------------------------------------------------------------

/// Render every line of `reader` until end of data or shutdown.
///
/// Lines are capped at [`MAX_PENDING_LINE_BYTES`] like file lines. Output is
/// flushed whenever the input goes quiet, so `tail -f x | loghue` stays live.
pub async fn pipe<R, W>(
    mut reader: R,
    renderer: &LineRenderer,
    mut out: W,
    mut shutdown: Shutdown,
) -> Result<Termination, StreamError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut line = Vec::new();
    loop {
        let budget = MAX_PENDING_LINE_BYTES.saturating_sub(line.len()) as u64;
        let mut limited = (&mut reader).take(budget);
        // An interrupted read keeps what it got in `line`.
        let read = tokio::select! {
            _ = shutdown.triggered() => None,
            _ = tokio::time::sleep(PIPE_IDLE_FLUSH) => Some(Ok(None)),
            r = limited.read_until(b'\n', &mut line) => Some(r.map(Some)),
        };

        let n = match read {
            None => {
                if !line.is_empty() {
                    let rendered = renderer.render_line(&line);
                    if let StreamState::Closed(t) =
                        output_status(out.write_all(&rendered), StreamState::Reading)?
                    {
                        return Ok(t);
                    }
                }
                return match output_status(out.flush(), StreamState::Reading)? {
                    StreamState::Closed(t) => Ok(t),
                    _ => Ok(Termination::Interrupted),
                };
            }
            Some(Ok(None)) => {
                if let StreamState::Closed(t) =
                    output_status(out.flush(), StreamState::Reading)?
                {
                    return Ok(t);
                }
                continue;
            }
            Some(Ok(Some(n))) => n,
            Some(Err(e)) => return Err(StreamError::Input(e)),
        };

        let at_end = n == 0;
        let complete = line.ends_with(b"\n") || line.len() >= MAX_PENDING_LINE_BYTES;
        if !line.is_empty() && (complete || at_end) {
            let rendered = renderer.render_line(&line);
            line.clear();
            if let StreamState::Closed(t) =
                output_status(out.write_all(&rendered), StreamState::Reading)?
            {
                return Ok(t);
            }
        }
        if at_end {
            return match output_status(out.flush(), StreamState::Reading)? {
                StreamState::Closed(t) => Ok(t),
                _ => Ok(Termination::EndOfFile),
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Stream `input` to stdout. Returns the process exit code.
pub async fn run(config: &AppConfig, input: &Input, scheme: Scheme) -> i32 {
    let settings = StreamSettings::from_config(config);
    let renderer = LineRenderer::new(MatcherPipeline::default(), scheme);
    let (trigger, shutdown) = shutdown_channel();
    let signals = spawn_signal_listener(trigger);

    let out = BufWriter::new(io::stdout().lock());
    let result = match input {
        Input::File(path) => match FileStream::open(path, &settings, &renderer, out, shutdown) {
            Ok(stream) => stream.run().await,
            Err(e) => Err(e),
        },
        Input::Stdin => {
            if settings.follow {
                log::debug!("follow has no effect on standard input");
            }
            let reader = tokio::io::BufReader::new(tokio::io::stdin());
            pipe(reader, &renderer, out, shutdown).await
        }
    };
    signals.abort();
    log::debug!("{} done: {:?}", input, result.as_ref().ok());

    match result {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("loghue: {}", e);
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
