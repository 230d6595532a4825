//! Protocol Module
//!
//! Field codec, command tokens, listing model and metrics shared by both
//! transport variants.
//!
//! ## Stream Wire Format (TCP)
//! ```text
//! bootstrap   server → client   int32 chunk size
//! command     issuer → responder   ASCII token (STOR, RETR, DEL, LIST, QUIT)
//! ack         either way        one opaque byte, only arrival matters
//! name        issuer → responder   short length + UTF-8 bytes
//! size        either way        int32, -1 = absent
//! payload     either way        raw chunks, each ≤ chunk size
//! elapsed     responder → issuer   float32
//! ```
//!
//! ## Datagram Wire Format (UDP)
//! Same logical fields, one datagram per send. Filenames travel without a
//! length prefix, the only acknowledgement is a one-byte `1`/`0` after the
//! initial metadata, and bulk chunks are never acknowledged.

mod codec;
mod command;
mod listing;
mod metrics;

pub use codec::{
    decode_filename, decode_filename_len, decode_float32, decode_int32, decode_short,
    encode_float32, encode_int32, encode_short, filename_len, FLOAT32_SIZE, INT32_SIZE,
    MAX_FILENAME_LEN, NOT_FOUND_SENTINEL, SHORT_SIZE, STATUS_FAILED, STATUS_OK,
};
pub use command::{validate_filename, Command, CommandKind, MAX_TOKEN_LEN};
pub use listing::{DirectoryListing, ListingEntry};
pub use metrics::{Stopwatch, TransferMetrics};

/// Acknowledgement byte; receivers ignore its value
pub const ACK: &[u8] = b"1";

/// Negative datagram acknowledgement
pub const NACK: &[u8] = b"0";

/// Delete confirmation tokens
pub const CONFIRM_YES: &[u8] = b"Y";
pub const CONFIRM_NO: &[u8] = b"N";
