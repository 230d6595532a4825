//! Transfer Engine
//!
//! The four file operations as request/response exchanges. Each exists in an
//! issuer form (the peer that sends the command) and a responder form, once
//! per transport variant:
//!
//! - [`stream`]: acknowledgement barriers between fields, -1 size sentinel,
//!   field-by-field listing paced by one sync byte per entry.
//! - [`datagram`]: unacknowledged bulk chunks, `1`/`0` metadata reply,
//!   listing sent as one text datagram.
//!
//! Payload loops and filename resolution live here and are shared.

pub mod datagram;
pub mod stream;

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::config::TransportKind;
use crate::error::{FramingError, FtpError, Result};
use crate::protocol::TransferMetrics;
use crate::transport::Transport;

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a retrieve as seen by the issuer
#[derive(Debug, Clone, PartialEq)]
pub enum RetrieveOutcome {
    Retrieved(TransferMetrics),
    NotFound,
}

/// Result of a delete as seen by the issuer
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted(TransferMetrics),

    /// The responder could not remove the file; stream transport only
    Failed(TransferMetrics),

    /// The operator declined; over datagrams nothing reaches the wire
    Abandoned(Option<TransferMetrics>),

    NotFound,
}

/// What a responder did for one command, for logging
#[derive(Debug, Clone, PartialEq)]
pub enum Served {
    Stored { name: String, metrics: TransferMetrics },
    Retrieved { name: String, metrics: TransferMetrics },
    NotFound { name: String },
    Deleted { name: String },
    DeleteFailed { name: String },
    Abandoned { name: String },
    Listed { count: u32 },
    Closed,
}

/// Decides whether an existing remote file may be deleted
pub trait Confirm {
    fn confirm_delete(&mut self, name: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm_delete(&mut self, name: &str) -> bool {
        self(name)
    }
}

// =============================================================================
// Filenames
// =============================================================================

/// Map a wire filename into `root`
///
/// The namespace is flat: empty names, `.`/`..`, separators and NUL bytes
/// resolve to nothing.
pub fn resolve_name(root: &Path, name: &str) -> Option<PathBuf> {
    let flat = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    flat.then(|| root.join(name))
}

/// Open a regular file whose size fits the int32 size field
pub(crate) fn open_for_sending(path: &Path) -> Option<(File, i32)> {
    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    let Ok(size) = i32::try_from(metadata.len()) else {
        tracing::warn!(
            "{} is {} bytes, too large for a 32-bit size field",
            path.display(),
            metadata.len()
        );
        return None;
    };
    match File::open(path) {
        Ok(file) => Some((file, size)),
        Err(e) => {
            tracing::warn!("Cannot open {}: {}", path.display(), e);
            None
        }
    }
}

/// Open a local file for upload, checking that its size fits the int32 field
pub(crate) fn open_local_source(path: &Path) -> Result<(File, i32)> {
    let file = File::open(path).map_err(|e| FtpError::local_io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| FtpError::local_io(path, e))?
        .len();
    let size = i32::try_from(len).map_err(|_| {
        FtpError::local_io(
            path,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "file too large for a 32-bit size field",
            ),
        )
    })?;
    Ok((file, size))
}

/// Wire name for a local path: its final component
pub fn wire_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| FtpError::InvalidFilename(path.display().to_string()))
}

/// Reject a negative size field
pub(crate) fn checked_size(size: i32) -> Result<u64> {
    u64::try_from(size).map_err(|_| FramingError::InvalidLength(size as i64).into())
}

// =============================================================================
// Payload
// =============================================================================

/// Destination for an incoming payload
///
/// A write failure does not stop the receive loop: later chunks are
/// discarded so the transfer still runs to its declared size, and the first
/// error is reported afterwards.
pub(crate) struct PayloadSink {
    file: Option<BufWriter<File>>,
    error: Option<io::Error>,
}

impl PayloadSink {
    pub(crate) fn create(path: &Path) -> Self {
        match File::create(path) {
            Ok(file) => Self {
                file: Some(BufWriter::new(file)),
                error: None,
            },
            Err(e) => {
                tracing::warn!("Cannot create {}: {}", path.display(), e);
                Self {
                    file: None,
                    error: Some(e),
                }
            }
        }
    }

    /// Sink that drops everything
    pub(crate) fn discard() -> Self {
        Self {
            file: None,
            error: None,
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(bytes) {
                self.fail(e);
            }
        }
    }

    /// Flush buffered data to disk
    pub(crate) fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                self.fail(e);
            }
        }
    }

    fn fail(&mut self, e: io::Error) {
        self.file = None;
        if self.error.is_none() {
            self.error = Some(e);
        }
    }

    pub(crate) fn into_result(mut self, path: &Path) -> Result<()> {
        self.close();
        match self.error {
            Some(e) => Err(FtpError::local_io(path, e)),
            None => Ok(()),
        }
    }
}

/// Send exactly `size` bytes of `source` in chunk-size units
pub(crate) fn send_payload<T, R>(t: &mut T, source: &mut R, path: &Path, size: u64) -> Result<u64>
where
    T: Transport + ?Sized,
    R: Read,
{
    let mut buf = BytesMut::zeroed(t.chunk_size());
    let mut sent: u64 = 0;
    while sent < size {
        let want = chunk_len(buf.len(), size - sent);
        let n = match source.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(FtpError::local_io(
                    path,
                    io::Error::new(io::ErrorKind::UnexpectedEof, "file shrank during transfer"),
                ))
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FtpError::local_io(path, e)),
        };
        t.send(&buf[..n])?;
        sent += n as u64;
    }
    tracing::trace!("Sent {} payload bytes", sent);
    Ok(sent)
}

/// Receive payload until `size` bytes have arrived
///
/// Stream receives never ask for more than what remains, so the following
/// field is left on the wire. Datagram receives take whatever one datagram
/// holds; bytes past the declared size are dropped.
pub(crate) fn receive_payload<T>(t: &mut T, sink: &mut PayloadSink, size: u64) -> Result<u64>
where
    T: Transport + ?Sized,
{
    let mut buf = BytesMut::zeroed(t.chunk_size());
    let mut received: u64 = 0;
    while received < size {
        let want = match t.kind() {
            TransportKind::Stream => chunk_len(buf.len(), size - received),
            TransportKind::Datagram => buf.len(),
        };
        let n = t.receive(&mut buf[..want])?;
        if n == 0 {
            if t.kind() == TransportKind::Stream {
                return Err(FramingError::Truncated {
                    expected: usize::try_from(size - received).unwrap_or(usize::MAX),
                    got: 0,
                }
                .into());
            }
            continue;
        }
        let remaining = size - received;
        let take = usize::try_from(remaining).map_or(n, |remaining| n.min(remaining));
        if take < n {
            tracing::warn!(
                "Dropping {} bytes past the declared size of {} bytes",
                n - take,
                size
            );
        }
        sink.write(&buf[..take]);
        received += take as u64;
    }
    tracing::trace!("Received {} payload bytes", received);
    Ok(received)
}

fn chunk_len(chunk_size: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(chunk_size, |remaining| remaining.min(chunk_size))
}
