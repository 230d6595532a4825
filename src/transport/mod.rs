//! Transport Module
//!
//! The protocol runs over two transports with different guarantees:
//!
//! - [`StreamTransport`] (TCP): ordered and reliable, but a receive may
//!   return fewer bytes than asked for. Exchanges place acknowledgement
//!   barriers between fields.
//! - [`DatagramTransport`] (UDP): every send is exactly one receivable
//!   unit, but units can be dropped or reordered. Nothing is retransmitted.
//!
//! Both expose the same capability set through [`Transport`], and
//! [`FieldIo`] layers the codec's field types on top.

mod datagram;
mod stream;

use std::net::SocketAddr;

use crate::config::TransportKind;
use crate::error::Result;
use crate::protocol::{
    decode_float32, decode_int32, decode_short, encode_float32, encode_int32, encode_short, ACK,
    FLOAT32_SIZE, INT32_SIZE, SHORT_SIZE,
};

pub use datagram::DatagramTransport;
pub use stream::StreamTransport;

/// Send/receive capabilities shared by both transport variants
pub trait Transport {
    fn kind(&self) -> TransportKind;

    /// Upper bound for every payload send or receive
    fn chunk_size(&self) -> usize;

    /// Send to the connected or current peer
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Send to `addr`, or to the current peer when `None`
    fn send_to(&mut self, bytes: &[u8], addr: Option<SocketAddr>) -> Result<()>;

    /// Receive up to `buf.len()` bytes; may return fewer
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Receive up to `buf.len()` bytes along with the sender's address
    fn receive_from(&mut self, buf: &mut [u8]) -> Result<(usize, Option<SocketAddr>)>;

    /// Receive exactly one logical field of `len` bytes
    fn receive_field(&mut self, len: usize) -> Result<Vec<u8>>;
}

/// Codec field helpers for any [`Transport`]
pub trait FieldIo: Transport {
    fn send_short(&mut self, n: i16) -> Result<()> {
        self.send(&encode_short(n))
    }

    fn send_int32(&mut self, n: i32) -> Result<()> {
        self.send(&encode_int32(n))
    }

    fn send_float32(&mut self, f: f32) -> Result<()> {
        self.send(&encode_float32(f))
    }

    fn send_ack(&mut self) -> Result<()> {
        self.send(ACK)
    }

    fn receive_short(&mut self) -> Result<i16> {
        Ok(decode_short(&self.receive_field(SHORT_SIZE)?)?)
    }

    fn receive_int32(&mut self) -> Result<i32> {
        Ok(decode_int32(&self.receive_field(INT32_SIZE)?)?)
    }

    fn receive_float32(&mut self) -> Result<f32> {
        Ok(decode_float32(&self.receive_field(FLOAT32_SIZE)?)?)
    }

    /// Block until the peer's one-byte acknowledgement arrives
    fn receive_ack(&mut self) -> Result<u8> {
        let field = self.receive_field(1)?;
        Ok(field.first().copied().unwrap_or_default())
    }
}

impl<T: Transport + ?Sized> FieldIo for T {}
