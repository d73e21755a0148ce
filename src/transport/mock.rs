use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::transport::{ConnectionId, Emission, Transport, TransportError, TransportResult};

/// Transport that records every emission instead of sending it
///
/// Used by tests to observe what a playback session pushed, and to
/// simulate connections that have gone away.
#[derive(Default)]
pub struct RecordingTransport {
    emissions: Mutex<Vec<(ConnectionId, Emission)>>,
    closed: Mutex<HashSet<ConnectionId>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the connection as gone; later emits fail with `Closed`
    pub fn close(&self, connection: ConnectionId) {
        self.closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connection);
    }

    /// Everything emitted to one connection, in order
    pub fn emissions_for(&self, connection: ConnectionId) -> Vec<Emission> {
        self.emissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| *id == connection)
            .map(|(_, emission)| emission.clone())
            .collect()
    }

    /// Number of row emissions delivered to one connection
    pub fn row_count(&self, connection: ConnectionId) -> usize {
        self.emissions_for(connection)
            .iter()
            .filter(|e| e.is_row())
            .count()
    }

    pub fn total(&self) -> usize {
        self.emissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Transport for RecordingTransport {
    fn emit(&self, connection: ConnectionId, emission: Emission) -> TransportResult<()> {
        let closed = self
            .closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&connection);
        if closed {
            return Err(TransportError::Closed(connection));
        }
        self.emissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((connection, emission));
        Ok(())
    }
}
