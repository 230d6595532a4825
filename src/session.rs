//! Client Session
//!
//! Owns the client end of one transport for the lifetime of a session and
//! exposes the four operations plus QUIT. Over TCP the session adopts the
//! chunk size the server announces right after connecting; over UDP the
//! configured chunk size is used as is and must match the server's.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{Config, TransportKind};
use crate::engine::{self, Confirm, DeleteOutcome, RetrieveOutcome};
use crate::error::{FramingError, FtpError, Result};
use crate::protocol::{validate_filename, CommandKind, DirectoryListing, TransferMetrics};
use crate::transport::{DatagramTransport, FieldIo, StreamTransport, Transport};

/// The transport a session runs over
pub enum SessionTransport {
    Stream(StreamTransport),
    Datagram(DatagramTransport),
}

/// Client side of one session
pub struct Session {
    transport: SessionTransport,

    /// Server address
    peer: SocketAddr,

    /// Where retrieved files are written
    local_dir: PathBuf,
}

impl Session {
    /// Connect to the server named by `config.addr`
    pub fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let peer = resolve(&config.addr)?;

        let transport = match config.transport {
            TransportKind::Stream => {
                let stream = TcpStream::connect(peer).map_err(FtpError::Transport)?;
                let mut t = StreamTransport::new(stream, config.chunk_size)?;
                t.set_receive_timeout(config.read_timeout())?;

                let announced = t.receive_int32().map_err(FtpError::desync("bootstrap"))?;
                let chunk_size = usize::try_from(announced)
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or(FramingError::InvalidLength(announced as i64))?;
                t.set_chunk_size(chunk_size);
                debug!("Server announced chunk size {}", chunk_size);
                SessionTransport::Stream(t)
            }
            TransportKind::Datagram => {
                let bind_addr = if peer.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                let socket = UdpSocket::bind(bind_addr).map_err(FtpError::Transport)?;
                let mut t = DatagramTransport::new(socket, Some(peer), config.chunk_size);
                t.set_receive_timeout(config.read_timeout())?;
                SessionTransport::Datagram(t)
            }
        };

        info!("Connected to {} over {}", peer, config.transport);
        Ok(Self {
            transport,
            peer,
            local_dir: config.local_dir.clone(),
        })
    }

    pub fn transport_kind(&self) -> TransportKind {
        match &self.transport {
            SessionTransport::Stream(_) => TransportKind::Stream,
            SessionTransport::Datagram(_) => TransportKind::Datagram,
        }
    }

    /// Chunk size in effect for this session
    pub fn chunk_size(&self) -> usize {
        match &self.transport {
            SessionTransport::Stream(t) => t.chunk_size(),
            SessionTransport::Datagram(t) => t.chunk_size(),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Upload a local file under its final path component
    pub fn store(&mut self, source: &Path) -> Result<TransferMetrics> {
        let name = engine::wire_name(source)?;
        match &mut self.transport {
            SessionTransport::Stream(t) => engine::stream::issue_store(t, source, &name),
            SessionTransport::Datagram(t) => engine::datagram::issue_store(t, source, &name),
        }
    }

    /// Download `name` into the local directory
    pub fn retrieve(&mut self, name: &str) -> Result<RetrieveOutcome> {
        validate_filename(name)?;
        let dest = engine::resolve_name(&self.local_dir, name)
            .ok_or_else(|| FtpError::InvalidFilename(name.to_string()))?;
        match &mut self.transport {
            SessionTransport::Stream(t) => engine::stream::issue_retrieve(t, name, &dest),
            SessionTransport::Datagram(t) => engine::datagram::issue_retrieve(t, name, &dest),
        }
    }

    pub fn delete<C>(&mut self, name: &str, confirm: &mut C) -> Result<DeleteOutcome>
    where
        C: Confirm + ?Sized,
    {
        match &mut self.transport {
            SessionTransport::Stream(t) => engine::stream::issue_delete(t, name, confirm),
            SessionTransport::Datagram(t) => engine::datagram::issue_delete(t, name, confirm),
        }
    }

    pub fn list(&mut self) -> Result<DirectoryListing> {
        match &mut self.transport {
            SessionTransport::Stream(t) => engine::stream::issue_list(t),
            SessionTransport::Datagram(t) => engine::datagram::issue_list(t),
        }
    }

    /// Exchange the closing byte and release the transport
    pub fn quit(self) -> Result<()> {
        match self.transport {
            SessionTransport::Stream(mut t) => {
                let farewell = engine::stream::issue_quit(&mut t);
                let closed = t.close();
                farewell?;
                closed
            }
            SessionTransport::Datagram(mut t) => engine::datagram::issue_quit(&mut t),
        }
    }

    /// Handle that can end the session from another thread
    pub fn interrupt_handle(&self) -> Result<InterruptHandle> {
        let target = match &self.transport {
            SessionTransport::Stream(t) => InterruptTarget::Stream(t.try_clone_stream()?),
            SessionTransport::Datagram(t) => InterruptTarget::Datagram {
                socket: t.try_clone_socket()?,
                peer: self.peer,
            },
        };
        Ok(InterruptHandle { target })
    }
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| FtpError::Config(format!("cannot resolve {addr}: {e}")))?
        .next()
        .ok_or_else(|| FtpError::Config(format!("{addr} resolved to no address")))
}

// =============================================================================
// Interrupt
// =============================================================================

enum InterruptTarget {
    Stream(TcpStream),
    Datagram { socket: UdpSocket, peer: SocketAddr },
}

/// Best-effort termination from outside the session's thread
///
/// Sends QUIT, waits at most the grace period for the closing byte and
/// releases the socket. Whatever the session thread was blocked on fails
/// once the stream is shut down.
pub struct InterruptHandle {
    target: InterruptTarget,
}

impl InterruptHandle {
    pub fn terminate(&self, grace: Duration) {
        let quit = CommandKind::Quit.token().as_bytes();
        let mut reply = [0u8; 1];
        match &self.target {
            InterruptTarget::Stream(stream) => {
                let mut stream = stream;
                if let Err(e) = stream.write_all(quit).and_then(|_| stream.flush()) {
                    debug!("Could not send QUIT: {}", e);
                } else {
                    let _ = stream.set_read_timeout(Some(grace));
                    match stream.read(&mut reply) {
                        Ok(n) if n > 0 => debug!("Server acknowledged QUIT"),
                        Ok(_) => debug!("Server closed before acknowledging QUIT"),
                        Err(e) => debug!("No QUIT acknowledgement: {}", e),
                    }
                }
                let _ = stream.shutdown(Shutdown::Both);
            }
            InterruptTarget::Datagram { socket, peer } => {
                if let Err(e) = socket.send_to(quit, peer) {
                    debug!("Could not send QUIT: {}", e);
                    return;
                }
                let _ = socket.set_read_timeout(Some(grace));
                match socket.recv_from(&mut reply) {
                    Ok(_) => debug!("Server acknowledged QUIT"),
                    Err(e) => debug!("No QUIT acknowledgement: {}", e),
                }
            }
        }
    }
}
