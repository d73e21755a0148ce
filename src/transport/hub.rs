//! Table of live client connections
//!
//! Each connection gets a sequential id and an unbounded queue; the socket
//! adapter drains the queue into the wire. Emitting to an id that is no
//! longer in the table reports [`TransportError::Closed`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::transport::{ConnectionId, Emission, Transport, TransportError, TransportResult};

struct Connection {
    sender: mpsc::UnboundedSender<Emission>,
    connected_at: DateTime<Utc>,
}

pub struct ConnectionHub {
    /// Next id to hand out; ids are never reused
    next_id: AtomicU64,
    connections: Mutex<HashMap<ConnectionId, Connection>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ConnectionId, Connection>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new connection, returning its id and the queue to drain
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Emission>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::unbounded_channel();

        self.table().insert(
            id,
            Connection {
                sender,
                connected_at: Utc::now(),
            },
        );
        debug!("Registered {}", id);

        (id, receiver)
    }

    /// Forget a connection; later emits to it are dropped
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        match self.table().remove(&id) {
            Some(connection) => {
                let lifetime = Utc::now() - connection.connected_at;
                debug!("Unregistered {} after {}ms", id, lifetime.num_milliseconds());
                true
            }
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.table().len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConnectionHub {
    fn emit(&self, connection: ConnectionId, emission: Emission) -> TransportResult<()> {
        let table = self.table();
        let Some(entry) = table.get(&connection) else {
            trace!("Dropping emission for closed {}", connection);
            return Err(TransportError::Closed(connection));
        };

        entry
            .sender
            .send(emission)
            .map_err(|_| TransportError::Closed(connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let hub = ConnectionHub::new();
        let (a, _rx_a) = hub.connect();
        let (b, _rx_b) = hub.connect();

        assert_eq!(b.0, a.0 + 1);
        assert_eq!(hub.connection_count(), 2);
    }

    #[test]
    fn test_emit_reaches_only_its_connection() {
        let hub = ConnectionHub::new();
        let (a, mut rx_a) = hub.connect();
        let (_b, mut rx_b) = hub.connect();

        hub.emit(a, Emission::End).unwrap();

        assert_eq!(rx_a.try_recv().unwrap(), Emission::End);
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_emit_after_disconnect_is_closed() {
        let hub = ConnectionHub::new();
        let (id, _rx) = hub.connect();

        assert!(hub.emit(id, Emission::End).is_ok());
        assert!(hub.disconnect(id));
        assert!(!hub.disconnect(id));
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(
            hub.emit(id, Emission::End),
            Err(TransportError::Closed(id))
        );
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_closed() {
        let hub = ConnectionHub::new();
        let (id, rx) = hub.connect();
        drop(rx);

        assert_eq!(
            hub.emit(id, Emission::End),
            Err(TransportError::Closed(id))
        );
    }
}
