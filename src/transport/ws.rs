//! WebSocket adapter
//!
//! One task per socket reads commands in order and feeds the registry;
//! a companion writer task drains the connection's hub queue into the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::playback::SessionRegistry;
use crate::transport::{ClientCommand, ConnectionHub, ConnectionId, Emission, Transport};

/// Reply for frames that do not parse as a command
pub const MALFORMED_COMMAND: &str = "Malformed command";

/// Drive one upgraded socket until the client goes away
pub async fn serve_connection(
    socket: WebSocket,
    hub: Arc<ConnectionHub>,
    registry: Arc<SessionRegistry>,
) {
    let (id, mut outbound) = hub.connect();
    info!("Client connected: {}", id);

    let (mut sink, mut stream) = socket.split();

    // Ends once the hub drops this connection's sender
    tokio::spawn(async move {
        while let Some(emission) = outbound.recv().await {
            let frame = match emission.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Failed to encode emission for {}: {}", id, e);
                    continue;
                }
            };
            if sink.send(Message::Text(frame)).await.is_err() {
                debug!("Writer for {} lost its socket", id);
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_frame(id, &text, &hub, &registry).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Socket error on {}: {}", id, e);
                break;
            }
        }
    }

    registry.on_disconnect(id);
    hub.disconnect(id);
    info!("Client disconnected: {}", id);
}

async fn handle_frame(id: ConnectionId, text: &str, hub: &ConnectionHub, registry: &SessionRegistry) {
    match ClientCommand::from_frame(text) {
        Ok(ClientCommand::RequestSensors(request)) => {
            debug!(
                "{} requested '{}' every {:?}ms",
                id, request.sensor_query, request.interval_duration
            );
            if let Err(e) = registry
                .start(id, &request.sensor_query, request.interval_duration)
                .await
            {
                debug!("Stream request on {} refused: {}", id, e);
            }
        }
        Ok(ClientCommand::StopSensors) => {
            if registry.stop(id) {
                info!("Stopping data stream on {}", id);
            }
        }
        Err(e) => {
            warn!("Ignoring frame from {}: {}", id, e);
            if let Err(e) = hub.emit(id, Emission::Error(MALFORMED_COMMAND.to_string())) {
                debug!("{}", e);
            }
        }
    }
}
