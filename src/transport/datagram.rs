//! Datagram Transport
//!
//! UDP adapter. One send is one datagram. The peer is fixed on the client
//! and learned from each command datagram on the server; datagrams from any
//! other address are discarded while an operation is in progress.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::config::{TransportKind, MAX_DATAGRAM_SIZE};
use crate::error::{FramingError, FtpError, Result};

use super::Transport;

/// Connectionless transport over a UDP socket
pub struct DatagramTransport {
    socket: UdpSocket,

    /// Address sends go to and receives are accepted from
    peer: Option<SocketAddr>,

    chunk_size: usize,
}

impl DatagramTransport {
    pub fn new(socket: UdpSocket, peer: Option<SocketAddr>, chunk_size: usize) -> Self {
        Self {
            socket,
            peer,
            chunk_size,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(FtpError::Transport)
    }

    /// Bound every blocking receive (`None` waits forever)
    pub fn set_receive_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.socket
            .set_read_timeout(timeout)
            .map_err(FtpError::Transport)
    }

    /// Independent handle to the same socket, for out-of-band shutdown
    pub fn try_clone_socket(&self) -> Result<UdpSocket> {
        self.socket.try_clone().map_err(FtpError::Transport)
    }

    /// Receive one datagram of up to [`MAX_DATAGRAM_SIZE`] bytes as text
    pub fn receive_text(&mut self) -> Result<String> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let n = self.receive(&mut buf)?;
        buf.truncate(n);
        String::from_utf8(buf).map_err(|_| FramingError::InvalidUtf8.into())
    }

    fn peer_or_err(&self) -> Result<SocketAddr> {
        self.peer.ok_or_else(|| {
            FtpError::Transport(io::Error::new(
                io::ErrorKind::NotConnected,
                "no datagram peer",
            ))
        })
    }

    fn recv_raw(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        loop {
            match self.socket.recv_from(buf) {
                Ok(received) => return Ok(received),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FtpError::Transport(e)),
            }
        }
    }
}

impl Transport for DatagramTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Datagram
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.send_to(bytes, None)
    }

    fn send_to(&mut self, bytes: &[u8], addr: Option<SocketAddr>) -> Result<()> {
        let target = match addr {
            Some(addr) => addr,
            None => self.peer_or_err()?,
        };
        self.socket
            .send_to(bytes, target)
            .map(|_| ())
            .map_err(FtpError::Transport)
    }

    /// Receive one datagram from the current peer
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let (n, from) = self.recv_raw(buf)?;
            match self.peer {
                Some(peer) if peer != from => {
                    tracing::debug!("Discarding datagram from {} (peer is {})", from, peer);
                }
                Some(_) => return Ok(n),
                None => {
                    self.peer = Some(from);
                    return Ok(n);
                }
            }
        }
    }

    /// Receive one datagram from anyone
    fn receive_from(&mut self, buf: &mut [u8]) -> Result<(usize, Option<SocketAddr>)> {
        let (n, from) = self.recv_raw(buf)?;
        Ok((n, Some(from)))
    }

    /// One field is one datagram of exactly `len` bytes
    fn receive_field(&mut self, len: usize) -> Result<Vec<u8>> {
        // One spare byte detects oversized datagrams instead of silently
        // accepting a truncated prefix.
        let mut field = vec![0u8; len + 1];
        let n = self.receive(&mut field)?;
        if n < len {
            return Err(FramingError::Truncated {
                expected: len,
                got: n,
            }
            .into());
        }
        if n > len {
            return Err(FramingError::UnexpectedLength {
                expected: len,
                got: n,
            }
            .into());
        }
        field.truncate(len);
        Ok(field)
    }
}
