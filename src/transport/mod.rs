//! Per-client duplex channel abstraction
//!
//! The playback core only ever pushes [`Emission`]s through [`Transport::emit`];
//! commands arrive from whichever adapter owns the socket (see [`ws`]).

pub mod hub;
pub mod mock;
pub mod protocol;
pub mod ws;

pub use hub::ConnectionHub;
pub use mock::RecordingTransport;
pub use protocol::{ClientCommand, Emission, ProtocolError, SensorRequest, STREAM_END};

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Identifier handed out by the adapter when a client connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection is gone; callers drop the payload silently
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

/// Outbound half of the client channel
///
/// Implementations must preserve per-connection ordering and must not block.
pub trait Transport: Send + Sync {
    /// Queue a payload for one connection
    fn emit(&self, connection: ConnectionId, emission: Emission) -> TransportResult<()>;
}
