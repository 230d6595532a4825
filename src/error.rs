//! Error types for tinyftp
//!
//! Two layers: [`FramingError`] for malformed or truncated wire fields, and
//! [`FtpError`] for everything an operation can end with. Callers use
//! [`FtpError::is_session_fatal`] to decide whether the session survives.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using FtpError
pub type Result<T> = std::result::Result<T, FtpError>;

/// A wire field could not be decoded
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("truncated field: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("invalid length field: {0}")]
    InvalidLength(i64),

    #[error("unexpected datagram length: expected {expected} bytes, got {got}")]
    UnexpectedLength { expected: usize, got: usize },

    #[error("field is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Unified error type for tinyftp operations
#[derive(Debug, Error)]
pub enum FtpError {
    // -------------------------------------------------------------------------
    // Wire Errors
    // -------------------------------------------------------------------------
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// A stream exchange failed part way; the byte stream can no longer be
    /// trusted to be aligned on field boundaries.
    #[error("{operation} aborted mid-exchange: {source}")]
    Desync {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("peer rejected {0}")]
    Rejected(String),

    // -------------------------------------------------------------------------
    // Filesystem Errors
    // -------------------------------------------------------------------------
    #[error("{}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),

    // -------------------------------------------------------------------------
    // Dispatch / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("command not recognized: {0:?}")]
    UnknownCommand(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl FtpError {
    /// True when the session must be torn down rather than resumed
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, FtpError::Framing(_) | FtpError::Desync { .. })
    }

    /// Wrap a filesystem failure with the path it happened on
    pub fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FtpError::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Closure for `map_err` that marks I/O failures as desynchronizing.
    ///
    /// Used by stream exchanges once the command token is on the wire: a
    /// transport failure, or a local read failure after a size was declared,
    /// leaves the peer expecting bytes that will never come.
    pub(crate) fn desync(operation: &'static str) -> impl Fn(FtpError) -> FtpError {
        move |err| match err {
            FtpError::Transport(source) | FtpError::LocalIo { source, .. } => {
                FtpError::Desync { operation, source }
            }
            other => other,
        }
    }
}
