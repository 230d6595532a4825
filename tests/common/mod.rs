//! Shared test helpers
//!
//! `ScriptedTransport` replays canned inbound bytes and records every send,
//! so engine tests can assert exact wire sequences without sockets.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::thread::{self, JoinHandle};

use tinyftp::error::{FramingError, FtpError, Result};
use tinyftp::network::Server;
use tinyftp::protocol::{encode_float32, encode_int32, encode_short};
use tinyftp::transport::Transport;
use tinyftp::{Config, TransportKind};

// =============================================================================
// Scripted Transport
// =============================================================================

pub struct ScriptedTransport {
    kind: TransportKind,
    chunk_size: usize,

    /// Stream inbound bytes, read in any split the caller asks for
    stream_inbound: VecDeque<u8>,

    /// Datagram inbound units, one per receive
    datagram_inbound: VecDeque<Vec<u8>>,

    /// Fail with a reset instead of reporting end of stream when drained
    reset_when_drained: bool,

    /// Cap on the bytes one stream receive returns
    max_read: Option<usize>,

    /// Every send, in order
    pub sent: Vec<Vec<u8>>,
}

impl ScriptedTransport {
    pub fn stream(chunk_size: usize) -> Self {
        Self::new(TransportKind::Stream, chunk_size)
    }

    pub fn datagram(chunk_size: usize) -> Self {
        Self::new(TransportKind::Datagram, chunk_size)
    }

    fn new(kind: TransportKind, chunk_size: usize) -> Self {
        Self {
            kind,
            chunk_size,
            stream_inbound: VecDeque::new(),
            datagram_inbound: VecDeque::new(),
            reset_when_drained: false,
            max_read: None,
            sent: Vec::new(),
        }
    }

    pub fn reset_when_drained(mut self) -> Self {
        self.reset_when_drained = true;
        self
    }

    /// Return at most `n` bytes per stream receive, so fields arrive split
    pub fn max_read(mut self, n: usize) -> Self {
        self.max_read = Some(n);
        self
    }

    /// Queue bytes (stream) or one datagram
    pub fn push(&mut self, bytes: &[u8]) -> &mut Self {
        match self.kind {
            TransportKind::Stream => self.stream_inbound.extend(bytes.iter().copied()),
            TransportKind::Datagram => self.datagram_inbound.push_back(bytes.to_vec()),
        }
        self
    }

    pub fn push_short(&mut self, n: i16) -> &mut Self {
        self.push(&encode_short(n))
    }

    pub fn push_int32(&mut self, n: i32) -> &mut Self {
        self.push(&encode_int32(n))
    }

    pub fn push_float32(&mut self, f: f32) -> &mut Self {
        self.push(&encode_float32(f))
    }

    /// Queue a stream filename field: short length then bytes
    pub fn push_name(&mut self, name: &str) -> &mut Self {
        self.push_short(name.len() as i16);
        self.push(name.as_bytes())
    }

    pub fn is_drained(&self) -> bool {
        self.stream_inbound.is_empty() && self.datagram_inbound.is_empty()
    }

    pub fn sent_bytes(&self) -> Vec<u8> {
        self.sent.concat()
    }

    fn drained_error(&self) -> FtpError {
        let kind = match (self.kind, self.reset_when_drained) {
            (_, true) => io::ErrorKind::ConnectionReset,
            (TransportKind::Datagram, false) => io::ErrorKind::WouldBlock,
            (TransportKind::Stream, false) => io::ErrorKind::UnexpectedEof,
        };
        FtpError::Transport(io::Error::new(kind, "script drained"))
    }
}

impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    fn send_to(&mut self, bytes: &[u8], _addr: Option<SocketAddr>) -> Result<()> {
        self.send(bytes)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.kind {
            TransportKind::Stream => {
                if self.stream_inbound.is_empty() {
                    if self.reset_when_drained {
                        return Err(self.drained_error());
                    }
                    return Ok(0);
                }
                let n = buf
                    .len()
                    .min(self.stream_inbound.len())
                    .min(self.max_read.unwrap_or(usize::MAX));
                for slot in buf.iter_mut().take(n) {
                    *slot = self.stream_inbound.pop_front().unwrap_or_default();
                }
                Ok(n)
            }
            TransportKind::Datagram => {
                let Some(datagram) = self.datagram_inbound.pop_front() else {
                    return Err(self.drained_error());
                };
                let n = buf.len().min(datagram.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(n)
            }
        }
    }

    fn receive_from(&mut self, buf: &mut [u8]) -> Result<(usize, Option<SocketAddr>)> {
        Ok((self.receive(buf)?, None))
    }

    fn receive_field(&mut self, len: usize) -> Result<Vec<u8>> {
        match self.kind {
            TransportKind::Stream => {
                let mut field = vec![0u8; len];
                let mut filled = 0;
                while filled < len {
                    let n = self.receive(&mut field[filled..])?;
                    if n == 0 {
                        return Err(FramingError::Truncated {
                            expected: len,
                            got: filled,
                        }
                        .into());
                    }
                    filled += n;
                }
                Ok(field)
            }
            TransportKind::Datagram => {
                let Some(datagram) = self.datagram_inbound.pop_front() else {
                    return Err(self.drained_error());
                };
                if datagram.len() != len {
                    return Err(FramingError::UnexpectedLength {
                        expected: len,
                        got: datagram.len(),
                    }
                    .into());
                }
                Ok(datagram)
            }
        }
    }
}

// =============================================================================
// Loopback Helpers
// =============================================================================

/// Bind a server on an ephemeral loopback port and run it on a thread
pub fn spawn_server(config: Config) -> (SocketAddr, JoinHandle<Result<()>>) {
    let mut server = Server::bind(config).unwrap();
    let addr = server.local_addr();
    let handle = thread::spawn(move || server.run());
    (addr, handle)
}

/// Server config for `root` on an ephemeral loopback port
pub fn server_config(root: &Path, transport: TransportKind) -> Config {
    Config::builder()
        .addr("127.0.0.1:0")
        .transport(transport)
        .root_dir(root)
        .read_timeout_ms(5_000)
        .once(true)
        .build()
}

/// Client config pointed at `addr`
pub fn client_config(addr: SocketAddr, local: &Path, transport: TransportKind) -> Config {
    Config::builder()
        .addr(addr.to_string())
        .transport(transport)
        .local_dir(local)
        .read_timeout_ms(5_000)
        .build()
}

/// Deterministic non-repeating payload
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
