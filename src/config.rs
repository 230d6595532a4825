//! Configuration for tinyftp
//!
//! Centralized configuration with sensible defaults, shared by the server
//! and the client. Both binaries map their command-line flags onto
//! [`ConfigBuilder`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{FtpError, Result};

/// Largest UDP payload that fits an IPv4 datagram
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Default chunk size for bulk transfer
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Which transport variant a session runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Connection-oriented, ordered, reliable byte stream (TCP)
    Stream,

    /// Connectionless, lossy, message-preserving datagrams (UDP)
    Datagram,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stream => f.write_str("tcp"),
            TransportKind::Datagram => f.write_str("udp"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = FtpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" | "stream" => Ok(TransportKind::Stream),
            "udp" | "datagram" => Ok(TransportKind::Datagram),
            other => Err(FtpError::Config(format!("unknown transport: {other}"))),
        }
    }
}

/// Main configuration for a tinyftp endpoint
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Listen address (server) or server address (client), host:port
    pub addr: String,

    /// Transport variant
    pub transport: TransportKind,

    // -------------------------------------------------------------------------
    // Transfer Configuration
    // -------------------------------------------------------------------------
    /// Maximum payload unit per send/receive during bulk transfer.
    /// Over TCP the server announces its value and the client adopts it.
    pub chunk_size: usize,

    // -------------------------------------------------------------------------
    // Filesystem Configuration
    // -------------------------------------------------------------------------
    /// Directory the server exposes as its flat file namespace
    pub root_dir: PathBuf,

    /// Directory the client stores retrieved files in
    pub local_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Timeouts
    // -------------------------------------------------------------------------
    /// Receive timeout while an operation is in progress (0 = none)
    pub read_timeout_ms: u64,

    /// Server-side wait for the next command on a stream (0 = none)
    pub idle_timeout_ms: u64,

    /// Upper bound on the best-effort termination handshake
    pub shutdown_grace_ms: u64,

    // -------------------------------------------------------------------------
    // Output / Lifecycle
    // -------------------------------------------------------------------------
    /// Suppress informational output
    pub quiet: bool,

    /// Server stops after the first session ends
    pub once: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:2121".to_string(),
            transport: TransportKind::Stream,
            chunk_size: DEFAULT_CHUNK_SIZE,
            root_dir: PathBuf::from("."),
            local_dir: PathBuf::from("."),
            read_timeout_ms: 10_000,
            idle_timeout_ms: 0,
            shutdown_grace_ms: 2_000,
            quiet: false,
            once: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check value ranges that the wire format depends on
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(FtpError::Config("chunk size must be positive".to_string()));
        }
        if i32::try_from(self.chunk_size).is_err() {
            return Err(FtpError::Config(format!(
                "chunk size {} does not fit a 32-bit field",
                self.chunk_size
            )));
        }
        if self.transport == TransportKind::Datagram && self.chunk_size > MAX_DATAGRAM_SIZE {
            return Err(FtpError::Config(format!(
                "chunk size {} exceeds the maximum datagram size {}",
                self.chunk_size, MAX_DATAGRAM_SIZE
            )));
        }
        if self.addr.is_empty() {
            return Err(FtpError::Config("address must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        millis(self.idle_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms.max(1))
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the address (host:port)
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Set the transport variant
    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.config.transport = kind;
        self
    }

    /// Set the bulk transfer chunk size (in bytes)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the directory exposed by the server
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root_dir = path.into();
        self
    }

    /// Set the directory the client downloads into
    pub fn local_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.local_dir = path.into();
        self
    }

    /// Set the per-operation read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the idle timeout while awaiting a command (in milliseconds)
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    /// Set the bound on the termination handshake (in milliseconds)
    pub fn shutdown_grace_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_grace_ms = ms;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    pub fn once(mut self, once: bool) -> Self {
        self.config.once = once;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
