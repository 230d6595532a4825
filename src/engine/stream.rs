//! Stream protocols
//!
//! Every exchange alternates strictly: a peer writes, then blocks until the
//! other side answers before writing the next field. Once the command token
//! is written, any I/O failure leaves the stream misaligned and is reported
//! as [`FtpError::Desync`].
//!
//! ```text
//! STOR  I: STOR   R: ack   I: len,name   R: ack   I: size,chunks...  R: elapsed,size
//! RETR  I: RETR   R: ack   I: len,name   R: size|-1   I: ack   R: chunks...
//!       I: ack    R: elapsed
//! DEL   I: DEL    R: ack   I: len,name   R: 1|-1   I: Y|N   [R: 1|-1]
//!       I: ack    R: elapsed
//! LIST  I: LIST   R: count  { R: len,name,size  I: sync } R: total,count  I: sync
//! QUIT  I: QUIT   R: ack
//! ```

use std::path::Path;

use tracing::trace;

use crate::error::{FramingError, FtpError, Result};
use crate::protocol::{
    decode_filename, decode_filename_len, filename_len, validate_filename, CommandKind,
    DirectoryListing, ListingEntry, Stopwatch, TransferMetrics, CONFIRM_NO, CONFIRM_YES,
    MAX_FILENAME_LEN, NOT_FOUND_SENTINEL, SHORT_SIZE, STATUS_FAILED, STATUS_OK,
};
use crate::transport::{FieldIo, Transport};

use super::{
    checked_size, open_for_sending, open_local_source, receive_payload, resolve_name,
    send_payload, Confirm, DeleteOutcome, PayloadSink, RetrieveOutcome, Served,
};

const STORE: &str = "store";
const RETRIEVE: &str = "retrieve";
const DELETE: &str = "delete";
const LIST: &str = "list";
const QUIT: &str = "quit";

fn send_token<T: Transport + ?Sized>(t: &mut T, kind: CommandKind) -> Result<()> {
    trace!("Sending {} token", kind);
    t.send(kind.token().as_bytes())
}

fn send_name<T: Transport + ?Sized>(t: &mut T, name: &str) -> Result<()> {
    t.send_short(filename_len(name)?)?;
    t.send(name.as_bytes())
}

fn receive_name<T: Transport + ?Sized>(t: &mut T) -> Result<String> {
    let len = decode_filename_len(&t.receive_field(SHORT_SIZE)?)?;
    Ok(decode_filename(t.receive_field(len)?)?)
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

    let mut exchange = |t: &mut T| -> Result<TransferMetrics> {
        send_token(t, CommandKind::Store)?;
        t.receive_ack()?;
        send_name(t, name)?;
        t.receive_ack()?;
        t.send_int32(size)?;
        send_payload(t, &mut file, source, checked_size(size)?)?;
        let elapsed = t.receive_float32()?;
        let byte_count = t.receive_int32()?;
        Ok(TransferMetrics::new(elapsed, byte_count))
    };
    exchange(t).map_err(FtpError::desync(STORE))
}

/// Answer a STOR whose token was already read
///
/// If the target cannot be written the payload is still consumed and the
/// metrics sent, so only this operation fails.
pub fn respond_store<T>(t: &mut T, root: &Path) -> Result<Served>
where
    T: Transport + ?Sized,
{
    let exchange = |t: &mut T| -> Result<(String, Option<PayloadSink>, TransferMetrics)> {
        t.send_ack()?;
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
        t.send_int32(metrics.byte_count)?;
        Ok((name, target.map(|_| sink), metrics))
    };
    let (name, sink, metrics) = exchange(t).map_err(FtpError::desync(STORE))?;

    let Some(sink) = sink else {
        return Err(FtpError::InvalidFilename(name));
    };
    sink.into_result(&root.join(&name))?;
    Ok(Served::Stored { name, metrics })
}

// =============================================================================
// Retrieve
// =============================================================================

/// Download `name` into `dest`
///
/// A -1 size ends the exchange with [`RetrieveOutcome::NotFound`] before any
/// payload. If `dest` cannot be written the payload is drained and the
/// exchange completed before the local error is returned.
pub fn issue_retrieve<T>(t: &mut T, name: &str, dest: &Path) -> Result<RetrieveOutcome>
where
    T: Transport + ?Sized,
{
    validate_filename(name)?;

    let exchange = |t: &mut T| -> Result<Option<(PayloadSink, TransferMetrics)>> {
        send_token(t, CommandKind::Retrieve)?;
        t.receive_ack()?;
        send_name(t, name)?;
        let size = t.receive_int32()?;
        if size == NOT_FOUND_SENTINEL {
            trace!("{} not found", name);
            return Ok(None);
        }
        let expected = checked_size(size)?;

        t.send_ack()?;
        let mut sink = PayloadSink::create(dest);
        receive_payload(t, &mut sink, expected)?;
        sink.close();

        t.send_ack()?;
        let elapsed = t.receive_float32()?;
        Ok(Some((sink, TransferMetrics::new(elapsed, size))))
    };

    match exchange(t).map_err(FtpError::desync(RETRIEVE))? {
        None => Ok(RetrieveOutcome::NotFound),
        Some((sink, metrics)) => {
            sink.into_result(dest)?;
            Ok(RetrieveOutcome::Retrieved(metrics))
        }
    }
}

/// Answer a RETR whose token was already read
pub fn respond_retrieve<T>(t: &mut T, root: &Path) -> Result<Served>
where
    T: Transport + ?Sized,
{
    let exchange = |t: &mut T| -> Result<Served> {
        t.send_ack()?;
        let name = receive_name(t)?;

        let source = resolve_name(root, &name).and_then(|path| {
            open_for_sending(&path).map(|(file, size)| (path, file, size))
        });
        let Some((path, mut file, size)) = source else {
            t.send_int32(NOT_FOUND_SENTINEL)?;
            return Ok(Served::NotFound { name });
        };

        t.send_int32(size)?;
        t.receive_ack()?;
        let stopwatch = Stopwatch::start();
        send_payload(t, &mut file, &path, checked_size(size)?)?;

        t.receive_ack()?;
        let metrics = stopwatch.finish(size);
        t.send_float32(metrics.elapsed_seconds)?;
        Ok(Served::Retrieved { name, metrics })
    };
    exchange(t).map_err(FtpError::desync(RETRIEVE))
}

// =============================================================================
// Delete
// =============================================================================

/// Delete `name` on the responder, asking `confirm` once it is known to exist
pub fn issue_delete<T, C>(t: &mut T, name: &str, confirm: &mut C) -> Result<DeleteOutcome>
where
    T: Transport + ?Sized,
    C: Confirm + ?Sized,
{
    validate_filename(name)?;

    let mut exchange = |t: &mut T| -> Result<DeleteOutcome> {
        send_token(t, CommandKind::Delete)?;
        t.receive_ack()?;
        send_name(t, name)?;
        if t.receive_int32()? == NOT_FOUND_SENTINEL {
            return Ok(DeleteOutcome::NotFound);
        }

        let confirmed = confirm.confirm_delete(name);
        t.send(if confirmed { CONFIRM_YES } else { CONFIRM_NO })?;
        let status = if confirmed {
            Some(t.receive_int32()?)
        } else {
            None
        };

        t.send_ack()?;
        let metrics = TransferMetrics::new(t.receive_float32()?, 0);
        Ok(match status {
            None => DeleteOutcome::Abandoned(Some(metrics)),
            Some(STATUS_OK) => DeleteOutcome::Deleted(metrics),
            Some(_) => DeleteOutcome::Failed(metrics),
        })
    };
    exchange(t).map_err(FtpError::desync(DELETE))
}

/// Answer a DEL whose token was already read
pub fn respond_delete<T>(t: &mut T, root: &Path) -> Result<Served>
where
    T: Transport + ?Sized,
{
    let exchange = |t: &mut T| -> Result<Served> {
        t.send_ack()?;
        let name = receive_name(t)?;

        let Some(path) = resolve_name(root, &name).filter(|path| path.is_file()) else {
            t.send_int32(NOT_FOUND_SENTINEL)?;
            return Ok(Served::NotFound { name });
        };
        t.send_int32(STATUS_OK)?;

        let decision = t.receive_field(1)?;
        let stopwatch = Stopwatch::start();
        let served = if decision.eq_ignore_ascii_case(CONFIRM_YES) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    t.send_int32(STATUS_OK)?;
                    Served::Deleted { name }
                }
                Err(e) => {
                    tracing::warn!("Failed to delete {}: {}", path.display(), e);
                    t.send_int32(STATUS_FAILED)?;
                    Served::DeleteFailed { name }
                }
            }
        } else {
            Served::Abandoned { name }
        };

        t.receive_ack()?;
        t.send_float32(stopwatch.elapsed_seconds())?;
        Ok(served)
    };
    exchange(t).map_err(FtpError::desync(DELETE))
}

// =============================================================================
// List
// =============================================================================

/// Fetch the responder's listing entry by entry
pub fn issue_list<T>(t: &mut T) -> Result<DirectoryListing>
where
    T: Transport + ?Sized,
{
    let exchange = |t: &mut T| -> Result<DirectoryListing> {
        send_token(t, CommandKind::List)?;
        let count = t.receive_int32()?;
        let count = usize::try_from(count).map_err(|_| FramingError::InvalidLength(count as i64))?;

        let mut entries = Vec::new();
        for _ in 0..count {
            let len = t.receive_int32()?;
            let len = usize::try_from(len)
                .ok()
                .filter(|len| (1..=MAX_FILENAME_LEN).contains(len))
                .ok_or(FramingError::InvalidLength(len as i64))?;
            let name = decode_filename(t.receive_field(len)?)?;
            let size = t.receive_int32()? as u32;
            entries.push(ListingEntry::new(name, size));
            t.send_ack()?;
        }

        let total_size = t.receive_int32()? as u32;
        let total_count = t.receive_int32()? as u32;
        t.send_ack()?;
        Ok(DirectoryListing::from_parts(entries, total_size, total_count))
    };
    let listing = exchange(t).map_err(FtpError::desync(LIST))?;
    if !listing.is_consistent() {
        tracing::warn!(
            "Listing totals ({} bytes, {} files) disagree with its {} entries",
            listing.total_size(),
            listing.total_count(),
            listing.entries().len()
        );
    }
    Ok(listing)
}

/// Answer a LIST whose token was already read
///
/// An unreadable directory is sent as an empty listing so the exchange
/// completes; the scan error is returned afterwards.
pub fn respond_list<T>(t: &mut T, root: &Path) -> Result<Served>
where
    T: Transport + ?Sized,
{
    let (listing, scan_error) = match DirectoryListing::scan(root) {
        Ok(listing) => (listing, None),
        Err(e) => (DirectoryListing::new(Vec::new()), Some(e)),
    };

    let exchange = |t: &mut T| -> Result<()> {
        t.send_int32(listing.total_count() as i32)?;
        for entry in listing.entries() {
            t.send_int32(entry.name.len() as i32)?;
            t.send(entry.name.as_bytes())?;
            t.send_int32(entry.size as i32)?;
            t.receive_ack()?;
        }
        t.send_int32(listing.total_size() as i32)?;
        t.send_int32(listing.total_count() as i32)?;
        t.receive_ack()?;
        Ok(())
    };
    exchange(t).map_err(FtpError::desync(LIST))?;

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
    let exchange = |t: &mut T| -> Result<()> {
        send_token(t, CommandKind::Quit)?;
        t.receive_ack()?;
        Ok(())
    };
    exchange(t).map_err(FtpError::desync(QUIT))
}

/// Send the closing byte
pub fn respond_quit<T: Transport + ?Sized>(t: &mut T) -> Result<Served> {
    t.send_ack().map_err(FtpError::desync(QUIT))?;
    Ok(Served::Closed)
}
