//! Network Module
//!
//! Server side of both transports.
//!
//! ## Architecture
//! - One session at a time, served on the calling thread
//! - TCP: [`Connection`] per accepted client, commands routed to the stream
//!   responders
//! - UDP: a single [`DatagramEndpoint`] whose peer follows the sender of
//!   each command datagram
//! - [`ShutdownHandle`] stops the loop from another thread

mod connection;
mod datagram;
mod server;

pub use connection::{Connection, Disconnect};
pub use datagram::DatagramEndpoint;
pub use server::{Server, ShutdownHandle};
