//! Frame codec
//!
//! Fixed-width encoding for the handful of field types the protocol uses.
//!
//! ## Field Types
//! ```text
//! ┌──────────────┬───────┬─────────────────────────────────────────────┐
//! │ short        │ 2     │ filename length (1..=32767)                 │
//! │ int32        │ 4     │ file size, count, status, -1 sentinel       │
//! │ float32      │ 4     │ elapsed seconds                             │
//! └──────────────┴───────┴─────────────────────────────────────────────┘
//! ```
//!
//! All fields use the host's native byte order. Client and server must run
//! on machines with the same endianness; the wire format does not normalize
//! to network order.

use bytes::Buf;

use crate::error::FramingError;

/// Width of a short (filename length) field
pub const SHORT_SIZE: usize = 2;

/// Width of an int32 field
pub const INT32_SIZE: usize = 4;

/// Width of a float32 field
pub const FLOAT32_SIZE: usize = 4;

/// Longest filename a short length field can describe
pub const MAX_FILENAME_LEN: usize = i16::MAX as usize;

/// Size value meaning "this file does not exist"
pub const NOT_FOUND_SENTINEL: i32 = -1;

/// Status values for delete outcomes
pub const STATUS_OK: i32 = 1;
pub const STATUS_FAILED: i32 = -1;

// =============================================================================
// Encoding
// =============================================================================

pub fn encode_short(n: i16) -> [u8; SHORT_SIZE] {
    n.to_ne_bytes()
}

pub fn encode_int32(n: i32) -> [u8; INT32_SIZE] {
    n.to_ne_bytes()
}

pub fn encode_float32(f: f32) -> [u8; FLOAT32_SIZE] {
    f.to_ne_bytes()
}

/// Length field for a filename
///
/// Fails for empty names and names longer than [`MAX_FILENAME_LEN`] bytes.
pub fn filename_len(name: &str) -> Result<i16, FramingError> {
    match i16::try_from(name.len()) {
        Ok(len) if len > 0 => Ok(len),
        _ => Err(FramingError::InvalidLength(name.len() as i64)),
    }
}

// =============================================================================
// Decoding
// =============================================================================

fn ensure_len(bytes: &[u8], expected: usize) -> Result<(), FramingError> {
    if bytes.len() < expected {
        return Err(FramingError::Truncated {
            expected,
            got: bytes.len(),
        });
    }
    Ok(())
}

pub fn decode_short(mut bytes: &[u8]) -> Result<i16, FramingError> {
    ensure_len(bytes, SHORT_SIZE)?;
    Ok(bytes.get_i16_ne())
}

pub fn decode_int32(mut bytes: &[u8]) -> Result<i32, FramingError> {
    ensure_len(bytes, INT32_SIZE)?;
    Ok(bytes.get_i32_ne())
}

pub fn decode_float32(mut bytes: &[u8]) -> Result<f32, FramingError> {
    ensure_len(bytes, FLOAT32_SIZE)?;
    Ok(bytes.get_f32_ne())
}

/// Decode and validate a filename length field
pub fn decode_filename_len(bytes: &[u8]) -> Result<usize, FramingError> {
    let len = decode_short(bytes)?;
    if len <= 0 {
        return Err(FramingError::InvalidLength(len as i64));
    }
    Ok(len as usize)
}

/// Decode filename bytes
pub fn decode_filename(bytes: Vec<u8>) -> Result<String, FramingError> {
    String::from_utf8(bytes).map_err(|_| FramingError::InvalidUtf8)
}
