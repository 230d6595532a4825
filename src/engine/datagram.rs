//! Datagram protocols
//!
//! Each send is one datagram. The filename travels bare, the responder
//! answers the initial metadata with a single `1` (or `0` for a missing
//! file), and bulk chunks are sent back to back with no acknowledgement.
//! A lost chunk leaves the receiver waiting; bounding that wait is up to the
//! caller's receive timeout.
//!
//! ```text
//! STOR  I: STOR  I: name  R: 1   I: size  I: chunks...  R: elapsed
//! RETR  I: RETR  I: name  R: 1|0  R: size  R: chunks...  R: elapsed
//! DEL   I: DEL   I: name  R: 1|0  R: elapsed
//! LIST  I: LIST  R: listing text
//! QUIT  I: QUIT  R: 1
//! ```
//!
//! Over datagrams the issuer fills in the byte count of the metrics itself;
//! the responder only reports elapsed time.

use std::path::Path;

use tracing::trace;

use crate::config::MAX_DATAGRAM_SIZE;
use crate::error::{FramingError, FtpError, Result};
use crate::protocol::{
    decode_filename, validate_filename, CommandKind, DirectoryListing, Stopwatch,
    TransferMetrics, ACK, MAX_FILENAME_LEN, NACK,
};
use crate::transport::{FieldIo, Transport};

use super::{
    checked_size, open_for_sending, open_local_source, receive_payload, resolve_name,
    send_payload, Confirm, DeleteOutcome, PayloadSink, RetrieveOutcome, Served,
};

/// Whether the responder accepted the initial metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Accepted,
    Refused,
}

fn send_command<T: Transport + ?Sized>(t: &mut T, kind: CommandKind, name: &str) -> Result<()> {
    trace!("Sending {} {}", kind, name);
    t.send(kind.token().as_bytes())?;
    t.send(name.as_bytes())
}

fn receive_reply<T: Transport + ?Sized>(t: &mut T, what: &str) -> Result<Reply> {
    let mut buf = [0u8; 16];
    let n = t.receive(&mut buf)?;
    match &buf[..n] {
        reply if reply == ACK => Ok(Reply::Accepted),
        reply if reply == NACK => Ok(Reply::Refused),
        other => Err(FtpError::Rejected(format!(
            "{what}: unexpected reply {:?}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn receive_name<T: Transport + ?Sized>(t: &mut T) -> Result<String> {
    let mut buf = vec![0u8; MAX_FILENAME_LEN + 1];
    let n = t.receive(&mut buf)?;
    if n == 0 || n > MAX_FILENAME_LEN {
        return Err(FramingError::InvalidLength(n as i64).into());
    }
    buf.truncate(n);
    Ok(decode_filename(buf)?)
}

// =============================================================================
// Store
// =============================================================================

/// Upload `source` under `name`
pub fn issue_store<T>(t: &mut T, source: &Path, name: &str) -> Result<TransferMetrics>
where
    T: Transport + ?Sized,
{
    validate_filename(name)?;
    let (mut file, size) = open_local_source(source)?;

    send_command(t, CommandKind::Store, name)?;
    if receive_reply(t, "store")? != Reply::Accepted {
        return Err(FtpError::Rejected(format!("store of {name}")));
    }
    t.send_int32(size)?;
    send_payload(t, &mut file, source, checked_size(size)?)?;

    let elapsed = t.receive_float32()?;
    Ok(TransferMetrics::new(elapsed, size))
}

/// Answer a STOR whose token was already read
pub fn respond_store<T>(t: &mut T, root: &Path) -> Result<Served>
where
    T: Transport + ?Sized,
{
    let name = receive_name(t)?;
    t.send_ack()?;
    let size = t.receive_int32()?;
    let expected = checked_size(size)?;
    trace!("Receiving {} ({} bytes)", name, size);

    let target = resolve_name(root, &name);
    let mut sink = match &target {
        Some(path) => PayloadSink::create(path),
        None => PayloadSink::discard(),
    };
    let stopwatch = Stopwatch::start();
    receive_payload(t, &mut sink, expected)?;
    sink.close();

    let metrics = stopwatch.finish(size);
    t.send_float32(metrics.elapsed_seconds)?;

    let Some(path) = target else {
        return Err(FtpError::InvalidFilename(name));
    };
    sink.into_result(&path)?;
    Ok(Served::Stored { name, metrics })
}

// =============================================================================
// Retrieve
// =============================================================================

/// Download `name` into `dest`
pub fn issue_retrieve<T>(t: &mut T, name: &str, dest: &Path) -> Result<RetrieveOutcome>
where
    T: Transport + ?Sized,
{
    validate_filename(name)?;

    send_command(t, CommandKind::Retrieve, name)?;
    if receive_reply(t, "retrieve")? == Reply::Refused {
        return Ok(RetrieveOutcome::NotFound);
    }
    let size = t.receive_int32()?;
    let expected = checked_size(size)?;

    let mut sink = PayloadSink::create(dest);
    receive_payload(t, &mut sink, expected)?;
    sink.close();

    let elapsed = t.receive_float32()?;
    sink.into_result(dest)?;
    Ok(RetrieveOutcome::Retrieved(TransferMetrics::new(elapsed, size)))
}

/// Answer a RETR whose token was already read
pub fn respond_retrieve<T>(t: &mut T, root: &Path) -> Result<Served>
where
    T: Transport + ?Sized,
{
    let name = receive_name(t)?;
    let source = resolve_name(root, &name)
        .and_then(|path| open_for_sending(&path).map(|(file, size)| (path, file, size)));
    let Some((path, mut file, size)) = source else {
        t.send(NACK)?;
        return Ok(Served::NotFound { name });
    };

    t.send_ack()?;
    t.send_int32(size)?;
    let stopwatch = Stopwatch::start();
    send_payload(t, &mut file, &path, checked_size(size)?)?;

    let metrics = stopwatch.finish(size);
    t.send_float32(metrics.elapsed_seconds)?;
    Ok(Served::Retrieved { name, metrics })
}

// =============================================================================
// Delete
// =============================================================================

/// Delete `name` on the responder
///
/// Confirmation is asked before anything is sent; a declined delete never
/// reaches the wire. The `0` reply covers both a missing file and a failed
/// removal, so both come back as [`DeleteOutcome::NotFound`].
pub fn issue_delete<T, C>(t: &mut T, name: &str, confirm: &mut C) -> Result<DeleteOutcome>
where
    T: Transport + ?Sized,
    C: Confirm + ?Sized,
{
    validate_filename(name)?;
    if !confirm.confirm_delete(name) {
        return Ok(DeleteOutcome::Abandoned(None));
    }

    send_command(t, CommandKind::Delete, name)?;
    if receive_reply(t, "delete")? == Reply::Refused {
        return Ok(DeleteOutcome::NotFound);
    }
    let elapsed = t.receive_float32()?;
    Ok(DeleteOutcome::Deleted(TransferMetrics::new(elapsed, 0)))
}

/// Answer a DEL whose token was already read
///
/// A failed removal is answered with `0`, the same reply as a missing file.
pub fn respond_delete<T>(t: &mut T, root: &Path) -> Result<Served>
where
    T: Transport + ?Sized,
{
    let stopwatch = Stopwatch::start();
    let name = receive_name(t)?;
    let Some(path) = resolve_name(root, &name).filter(|path| path.is_file()) else {
        t.send(NACK)?;
        return Ok(Served::NotFound { name });
    };

    if let Err(e) = std::fs::remove_file(&path) {
        tracing::warn!("Failed to delete {}: {}", path.display(), e);
        t.send(NACK)?;
        return Ok(Served::DeleteFailed { name });
    }
    t.send_ack()?;
    t.send_float32(stopwatch.elapsed_seconds())?;
    Ok(Served::Deleted { name })
}

// =============================================================================
// List
// =============================================================================

/// Fetch the responder's listing as one text datagram
pub fn issue_list<T: Transport + ?Sized>(t: &mut T) -> Result<DirectoryListing> {
    t.send(CommandKind::List.token().as_bytes())?;
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let n = t.receive(&mut buf)?;
    buf.truncate(n);
    let text = String::from_utf8(buf).map_err(|_| FramingError::InvalidUtf8)?;
    Ok(DirectoryListing::parse_text(&text)?)
}

/// Answer a LIST whose token was already read
///
/// Listings larger than one datagram lose their trailing entries. An
/// unreadable directory is answered with an empty listing and the scan error
/// returned afterwards.
pub fn respond_list<T: Transport + ?Sized>(t: &mut T, root: &Path) -> Result<Served> {
    let (listing, scan_error) = match DirectoryListing::scan(root) {
        Ok(listing) => (listing, None),
        Err(e) => (DirectoryListing::new(Vec::new()), Some(e)),
    };
    let (text, shown) = listing.render_bounded(MAX_DATAGRAM_SIZE);
    if shown < listing.entries().len() {
        tracing::warn!(
            "Listing of {} truncated to {} of {} entries",
            root.display(),
            shown,
            listing.entries().len()
        );
    }
    t.send(text.as_bytes())?;

    if let Some(e) = scan_error {
        return Err(FtpError::local_io(root, e));
    }
    Ok(Served::Listed {
        count: listing.total_count(),
    })
}

// =============================================================================
// Quit
// =============================================================================

/// Send QUIT and wait for the closing byte
pub fn issue_quit<T: Transport + ?Sized>(t: &mut T) -> Result<()> {
    t.send(CommandKind::Quit.token().as_bytes())?;
    let mut buf = [0u8; 1];
    t.receive(&mut buf)?;
    Ok(())
}

/// Send the closing byte
pub fn respond_quit<T: Transport + ?Sized>(t: &mut T) -> Result<Served> {
    t.send_ack()?;
    Ok(Served::Closed)
}
