//! Connection Handler
//!
//! Serves one client over a TCP stream: announces the chunk size, then reads
//! command tokens and runs the matching responder until QUIT, disconnect or a
//! session-fatal error.

use std::io;
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::engine::{self, Served};
use crate::error::{FramingError, FtpError, Result};
use crate::protocol::{CommandKind, MAX_TOKEN_LEN};
use crate::transport::{FieldIo, StreamTransport, Transport};

/// Canonical tokens a partial read may still complete into
const WIRE_TOKENS: [CommandKind; 5] = [
    CommandKind::Store,
    CommandKind::Retrieve,
    CommandKind::Delete,
    CommandKind::List,
    CommandKind::Quit,
];

/// Handles a single client connection
pub struct Connection {
    transport: StreamTransport,

    /// Directory the client's filenames resolve into
    root_dir: PathBuf,

    /// Receive bound while an operation is in progress
    read_timeout: Option<Duration>,

    /// Receive bound while waiting for the next command
    idle_timeout: Option<Duration>,

    /// Peer address for logging
    peer_addr: String,
}

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// Client sent QUIT and got the closing byte
    Quit,

    /// Client closed or reset the stream
    Hangup,

    /// No command arrived within the idle timeout
    Idle,
}

/// Result of reading one command token
enum Token {
    Command(CommandKind),
    Unknown(Vec<u8>),
    Hangup,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, config: &Config) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let transport = StreamTransport::new(stream, config.chunk_size)?;

        Ok(Self {
            transport,
            root_dir: config.root_dir.clone(),
            read_timeout: config.read_timeout(),
            idle_timeout: config.idle_timeout(),
            peer_addr,
        })
    }

    /// Independent handle to the client socket
    pub fn try_clone_stream(&self) -> Result<TcpStream> {
        self.transport.try_clone_stream()
    }

    /// Handle the connection (blocking until closed)
    pub fn handle(mut self) -> Result<Disconnect> {
        tracing::debug!("Connection established from {}", self.peer_addr);
        self.transport.set_send_timeout(self.read_timeout)?;
        let chunk_size = self.transport.chunk_size() as i32;
        self.transport
            .send_int32(chunk_size)
            .map_err(FtpError::desync("bootstrap"))?;

        loop {
            self.transport.set_receive_timeout(self.idle_timeout)?;
            let token = match self.read_token() {
                Ok(token) => token,
                Err(FtpError::Transport(ref e)) if is_timeout(e) => {
                    tracing::debug!("Idle timeout for client {}", self.peer_addr);
                    let _ = self.transport.close();
                    return Ok(Disconnect::Idle);
                }
                Err(FtpError::Transport(ref e)) if is_hangup(e) => {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(Disconnect::Hangup);
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            let kind = match token {
                Token::Command(kind) => kind,
                Token::Hangup => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(Disconnect::Hangup);
                }
                Token::Unknown(bytes) => {
                    tracing::warn!(
                        "Unknown command token {:?} from {}",
                        String::from_utf8_lossy(&bytes),
                        self.peer_addr
                    );
                    continue;
                }
            };

            tracing::trace!("Received {} from {}", kind, self.peer_addr);
            self.transport.set_receive_timeout(self.read_timeout)?;

            match self.execute_command(kind) {
                Ok(Served::Closed) => {
                    tracing::debug!("Client {} quit", self.peer_addr);
                    self.transport.close()?;
                    return Ok(Disconnect::Quit);
                }
                Ok(served) => {
                    tracing::debug!("Served {} for {}: {:?}", kind, self.peer_addr, served);
                }
                Err(e) if e.is_session_fatal() => {
                    tracing::warn!("Closing {} after {}: {}", self.peer_addr, kind, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("{} for {} failed: {}", kind, self.peer_addr, e);
                }
            }
        }
    }

    /// Run the responder for one command
    fn execute_command(&mut self, kind: CommandKind) -> Result<Served> {
        let t = &mut self.transport;
        let root = self.root_dir.as_path();
        match kind {
            CommandKind::Store => engine::stream::respond_store(t, root),
            CommandKind::Retrieve => engine::stream::respond_retrieve(t, root),
            CommandKind::Delete => engine::stream::respond_delete(t, root),
            CommandKind::List => engine::stream::respond_list(t, root),
            CommandKind::Quit => engine::stream::respond_quit(t),
        }
    }

    /// Read one token of at most [`MAX_TOKEN_LEN`] bytes
    ///
    /// The issuer waits for a reply after its token, so reading stops as soon
    /// as the bytes form a token or can no longer become one.
    fn read_token(&mut self) -> Result<Token> {
        let mut buf = [0u8; MAX_TOKEN_LEN];
        let mut filled = 0;
        loop {
            let n = self.transport.receive(&mut buf[filled..])?;
            if n == 0 {
                return match filled {
                    0 => Ok(Token::Hangup),
                    _ => Err(FramingError::Truncated {
                        expected: MAX_TOKEN_LEN,
                        got: filled,
                    }
                    .into()),
                };
            }
            filled += n;

            let read = &buf[..filled];
            if let Some(kind) = CommandKind::from_token(read) {
                return Ok(Token::Command(kind));
            }
            if filled == MAX_TOKEN_LEN || !is_token_prefix(read) {
                return Ok(Token::Unknown(read.to_vec()));
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_token_prefix(bytes: &[u8]) -> bool {
    WIRE_TOKENS.iter().any(|kind| {
        let token = kind.token().as_bytes();
        token.len() > bytes.len() && token[..bytes.len()].eq_ignore_ascii_case(bytes)
    })
}

fn is_timeout(e: &io::Error) -> bool {
    // Windows reports TimedOut where Unix reports WouldBlock
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn is_hangup(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
