//! # tinyftp
//!
//! A minimal remote file-access protocol with:
//! - Store, retrieve, delete and list over a flat server directory
//! - Two transports: TCP with handshake barriers, UDP with one datagram per send
//! - Per-operation timing metrics
//! - A server binary and an interactive client binary
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐            ┌──────────────────────────┐
//! │   Client (Dispatcher)    │            │    Server (Connection /  │
//! │   line → Command         │            │    DatagramEndpoint)     │
//! └────────────┬─────────────┘            └────────────┬─────────────┘
//!              │ issue_*                               │ respond_*
//! ┌────────────▼─────────────┐            ┌────────────▼─────────────┐
//! │     Transfer Engine      │            │     Transfer Engine      │
//! └────────────┬─────────────┘            └────────────┬─────────────┘
//!              │                                       │
//! ┌────────────▼─────────────┐   wire     ┌────────────▼─────────────┐
//! │ Transport (TCP | UDP)    │◄──────────►│ Transport (TCP | UDP)    │
//! │ + Frame Codec            │            │ + Frame Codec            │
//! └──────────────────────────┘            └──────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod output;

pub mod dispatcher;
pub mod engine;
pub mod network;
pub mod protocol;
pub mod session;
pub mod transport;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, TransportKind};
pub use dispatcher::{Dispatcher, DispatcherState};
pub use error::{FramingError, FtpError, Result};
pub use network::{Server, ShutdownHandle};
pub use output::Console;
pub use session::{InterruptHandle, Session};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tinyftp
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
