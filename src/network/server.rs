//! Server
//!
//! Binds the configured transport and serves one client session at a time.

use std::io::Write;
use std::net::{
    IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{Config, TransportKind};
use crate::error::{FtpError, Result};
use crate::protocol::ACK;

use super::connection::{Connection, Disconnect};
use super::datagram::DatagramEndpoint;

const WAKE_TIMEOUT: Duration = Duration::from_millis(500);

enum Listener {
    Stream(TcpListener),
    Datagram(DatagramEndpoint),
}

/// File server for tinyftp
pub struct Server {
    config: Config,
    listener: Listener,
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Validate `config` and bind its address
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        if !config.root_dir.is_dir() {
            return Err(FtpError::Config(format!(
                "root directory {} does not exist",
                config.root_dir.display()
            )));
        }

        let (listener, local_addr) = match config.transport {
            TransportKind::Stream => {
                let listener = TcpListener::bind(&config.addr).map_err(FtpError::Transport)?;
                let local_addr = listener.local_addr().map_err(FtpError::Transport)?;
                (Listener::Stream(listener), local_addr)
            }
            TransportKind::Datagram => {
                let socket = UdpSocket::bind(&config.addr).map_err(FtpError::Transport)?;
                let endpoint = DatagramEndpoint::new(socket, &config);
                let local_addr = endpoint.local_addr()?;
                (Listener::Datagram(endpoint), local_addr)
            }
        };

        tracing::info!(
            "Listening on {} ({}), serving {}",
            local_addr,
            config.transport,
            config.root_dir.display()
        );

        Ok(Self {
            shutdown: ShutdownHandle::new(config.transport, local_addr),
            config,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle for stopping the server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Start the server (blocking)
    pub fn run(&mut self) -> Result<()> {
        match &mut self.listener {
            Listener::Stream(listener) => serve_streams(listener, &self.config, &self.shutdown),
            Listener::Datagram(endpoint) => endpoint.serve(&self.shutdown),
        }
    }
}

fn serve_streams(listener: &TcpListener, config: &Config, shutdown: &ShutdownHandle) -> Result<()> {
    let mut sessions: u64 = 0;
    loop {
        let accepted = listener.accept();
        if shutdown.is_requested() {
            tracing::info!("Shutdown requested, no longer accepting");
            return Ok(());
        }
        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        sessions += 1;
        tracing::info!("Session {} started with {}", sessions, peer);

        let ended = Connection::new(stream, config).and_then(|connection| {
            if let Ok(stream) = connection.try_clone_stream() {
                shutdown.set_stream_peer(stream);
            }
            connection.handle()
        });
        shutdown.clear_active();

        match ended {
            Ok(Disconnect::Quit) => tracing::info!("Session {} closed by {}", sessions, peer),
            Ok(Disconnect::Hangup) => tracing::info!("Session {} dropped by {}", sessions, peer),
            Ok(Disconnect::Idle) => tracing::info!("Session {} with {} timed out", sessions, peer),
            Err(e) => tracing::warn!("Session {} with {} ended: {}", sessions, peer, e),
        }

        if config.once || shutdown.is_requested() {
            return Ok(());
        }
    }
}

// =============================================================================
// Shutdown
// =============================================================================

/// The peer that gets the closing byte on shutdown
enum ActivePeer {
    Stream(TcpStream),
    Datagram { socket: UdpSocket, peer: SocketAddr },
}

struct ShutdownState {
    requested: AtomicBool,
    active: Mutex<Option<ActivePeer>>,
    kind: TransportKind,

    /// Address a wake-up connection or datagram is sent to
    wake_addr: SocketAddr,
}

/// Stops a running [`Server`]
///
/// The active peer, if any, is sent the closing byte and its stream shut
/// down, and the listener is woken so [`Server::run`] returns.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<ShutdownState>,
}

impl ShutdownHandle {
    fn new(kind: TransportKind, local_addr: SocketAddr) -> Self {
        let wake_ip = match local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        Self {
            inner: Arc::new(ShutdownState {
                requested: AtomicBool::new(false),
                active: Mutex::new(None),
                kind,
                wake_addr: SocketAddr::new(wake_ip, local_addr.port()),
            }),
        }
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Request shutdown; safe to call more than once
    pub fn shutdown(&self) {
        if self.inner.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(active) = self.inner.active.lock().take() {
            farewell(active);
        }
        self.wake();
    }

    pub(crate) fn set_stream_peer(&self, stream: TcpStream) {
        *self.inner.active.lock() = Some(ActivePeer::Stream(stream));
    }

    pub(crate) fn set_datagram_peer(&self, socket: UdpSocket, peer: SocketAddr) {
        *self.inner.active.lock() = Some(ActivePeer::Datagram { socket, peer });
    }

    pub(crate) fn clear_active(&self) {
        self.inner.active.lock().take();
    }

    fn wake(&self) {
        let addr = self.inner.wake_addr;
        let woken = match self.inner.kind {
            TransportKind::Stream => TcpStream::connect_timeout(&addr, WAKE_TIMEOUT).map(|_| ()),
            TransportKind::Datagram => {
                let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                UdpSocket::bind(bind_addr).and_then(|socket| socket.send_to(&[], addr).map(|_| ()))
            }
        };
        if let Err(e) = woken {
            tracing::debug!("Could not wake listener at {}: {}", addr, e);
        }
    }
}

fn farewell(active: ActivePeer) {
    let sent = match active {
        ActivePeer::Stream(mut stream) => {
            let sent = stream.write_all(ACK).and_then(|_| stream.flush());
            let _ = stream.shutdown(Shutdown::Both);
            sent
        }
        ActivePeer::Datagram { socket, peer } => socket.send_to(ACK, peer).map(|_| ()),
    };
    match sent {
        Ok(()) => tracing::debug!("Sent closing byte to active peer"),
        Err(e) => tracing::debug!("Could not send closing byte: {}", e),
    }
}
