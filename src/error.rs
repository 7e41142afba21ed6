//! Error types shared by the theme loader and the file stream.
//!
//! Only failures live here. Outcomes that merely steer the stream (no new
//! data yet, file rotated, operator interrupt) are plain enums in
//! [`crate::watcher`] and [`crate::stream`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A theme definition that cannot be turned into a catalog.
#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("malformed theme {origin}: duplicate category \"{category}\"")]
    DuplicateCategory { origin: String, category: String },

    #[error("malformed theme {origin}: category \"{category}\" uses unsupported color \"{color}\"")]
    UnsupportedColor {
        origin: String,
        category: String,
        color: String,
    },

    #[error("malformed theme {origin}: {message}")]
    Syntax { origin: String, message: String },

    #[error("malformed theme {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fatal failures of the file stream.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read standard input: {0}")]
    Input(#[source] io::Error),

    #[error("cannot write output: {0}")]
    Output(#[source] io::Error),
}

impl StreamError {
    /// Map an error from opening `path` onto the open-failure kinds.
    pub fn from_open(path: PathBuf, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => StreamError::NotFound { path },
            io::ErrorKind::PermissionDenied => StreamError::PermissionDenied { path },
            _ => StreamError::Io { path, source: err },
        }
    }
}

/// Top-level error surfaced to the binary.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Theme(#[from] ThemeError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

pub type Result<T> = std::result::Result<T, Error>;
