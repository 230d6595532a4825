//! Stream Transport
//!
//! TCP adapter. Reads may return short, so fixed-width fields are assembled
//! with repeated reads and payload receives are bounded by what remains.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::config::TransportKind;
use crate::error::{FramingError, FtpError, Result};

use super::Transport;

/// Connection-oriented transport over a TCP stream
pub struct StreamTransport {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer, flushed at every send
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: Option<SocketAddr>,

    chunk_size: usize,
}

impl StreamTransport {
    /// Wrap a connected stream
    ///
    /// Disables Nagle's algorithm: every exchange is a small field followed by
    /// a wait for the peer.
    pub fn new(stream: TcpStream, chunk_size: usize) -> Result<Self> {
        let peer_addr = stream.peer_addr().ok();
        stream.set_nodelay(true).map_err(FtpError::Transport)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone().map_err(FtpError::Transport)?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            peer_addr,
            chunk_size,
        })
    }

    /// Adopt the chunk size announced during bootstrap
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    /// Bound every blocking receive (`None` waits forever)
    pub fn set_receive_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.reader
            .get_ref()
            .set_read_timeout(timeout)
            .map_err(FtpError::Transport)
    }

    pub fn set_send_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.writer
            .get_ref()
            .set_write_timeout(timeout)
            .map_err(FtpError::Transport)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Independent handle to the same socket, for out-of-band shutdown
    pub fn try_clone_stream(&self) -> Result<TcpStream> {
        self.writer.get_ref().try_clone().map_err(FtpError::Transport)
    }

    /// Flush pending output and close both directions
    pub fn close(mut self) -> Result<()> {
        self.writer.flush().map_err(FtpError::Transport)?;
        match self.writer.get_ref().shutdown(Shutdown::Both) {
            // Peer already gone; nothing left to close.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(FtpError::Transport),
        }
    }
}

impl Transport for StreamTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stream
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(FtpError::Transport)?;
        self.writer.flush().map_err(FtpError::Transport)
    }

    /// The stream is already connected; the address is ignored
    fn send_to(&mut self, bytes: &[u8], _addr: Option<SocketAddr>) -> Result<()> {
        self.send(bytes)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.reader.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FtpError::Transport(e)),
            }
        }
    }

    fn receive_from(&mut self, buf: &mut [u8]) -> Result<(usize, Option<SocketAddr>)> {
        let n = self.receive(buf)?;
        Ok((n, self.peer_addr))
    }

    fn receive_field(&mut self, len: usize) -> Result<Vec<u8>> {
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
}
