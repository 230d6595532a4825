//! Datagram Endpoint
//!
//! Serves clients over one UDP socket. There is no connection: every command
//! datagram names its sender, who becomes the peer for that operation.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::engine::{self, Served};
use crate::error::{FtpError, Result};
use crate::protocol::{CommandKind, MAX_TOKEN_LEN};
use crate::transport::{DatagramTransport, Transport};

use super::server::ShutdownHandle;

/// Responder side of the datagram protocols
pub struct DatagramEndpoint {
    transport: DatagramTransport,
    root_dir: PathBuf,
    read_timeout: Option<Duration>,
    once: bool,
}

impl DatagramEndpoint {
    pub fn new(socket: UdpSocket, config: &Config) -> Self {
        Self {
            transport: DatagramTransport::new(socket, None, config.chunk_size),
            root_dir: config.root_dir.clone(),
            read_timeout: config.read_timeout(),
            once: config.once,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn try_clone_socket(&self) -> Result<UdpSocket> {
        self.transport.try_clone_socket()
    }

    /// Serve commands until shutdown, or until the first QUIT when `once`
    pub fn serve(&mut self, shutdown: &ShutdownHandle) -> Result<()> {
        let mut token = [0u8; MAX_TOKEN_LEN + 1];
        loop {
            self.transport.set_receive_timeout(None)?;
            let received = self.transport.receive_from(&mut token);
            if shutdown.is_requested() {
                return Ok(());
            }
            let (n, from) = match received {
                Ok((n, Some(from))) => (n, from),
                Ok((_, None)) => continue,
                Err(FtpError::Transport(ref e)) if is_transient(e) => continue,
                Err(e) => return Err(e),
            };

            let Some(kind) = CommandKind::from_token(&token[..n]) else {
                tracing::warn!(
                    "Ignoring {} byte datagram from {} that is not a command",
                    n,
                    from
                );
                continue;
            };

            if self.transport.peer() != Some(from) {
                tracing::info!("Serving datagram peer {}", from);
                self.transport.set_peer(from);
                if let Ok(socket) = self.transport.try_clone_socket() {
                    shutdown.set_datagram_peer(socket, from);
                }
            }
            tracing::trace!("Received {} from {}", kind, from);

            self.transport.set_receive_timeout(self.read_timeout)?;
            match self.execute_command(kind) {
                Ok(Served::Closed) => {
                    tracing::debug!("Peer {} quit", from);
                    shutdown.clear_active();
                    if self.once {
                        return Ok(());
                    }
                }
                Ok(served) => {
                    tracing::debug!("Served {} for {}: {:?}", kind, from, served);
                }
                Err(e) => {
                    tracing::warn!("{} for {} failed: {}", kind, from, e);
                }
            }
        }
    }

    fn execute_command(&mut self, kind: CommandKind) -> Result<Served> {
        let t = &mut self.transport;
        let root = self.root_dir.as_path();
        match kind {
            CommandKind::Store => engine::datagram::respond_store(t, root),
            CommandKind::Retrieve => engine::datagram::respond_retrieve(t, root),
            CommandKind::Delete => engine::datagram::respond_delete(t, root),
            CommandKind::List => engine::datagram::respond_list(t, root),
            CommandKind::Quit => engine::datagram::respond_quit(t),
        }
    }
}

/// Receive failures that say nothing about the socket itself
fn is_transient(e: &io::Error) -> bool {
    // ICMP port unreachable from an earlier send surfaces as a reset on some
    // platforms
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}
