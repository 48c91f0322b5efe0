//! Connection bookkeeping for the websocket server
//!
//! This module tracks every open websocket connection, including:
//! - Connection id assignment and the server-wide connection cap
//! - The outgoing channel each connection's writer task drains
//! - The frame format (text or binary) replies should use
//!
//! Rooms never hold sockets; they hold connection ids, and the manager turns
//! relay output into frames on the right channels.

use crate::relay::Outbound;
use log::{debug, info, warn};
use shared::{encode_binary, encode_text, ConnectionId, ServerEvent};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Encoding of websocket frames on a connection.
///
/// JSON travels in text frames and bincode in binary frames. A connection's
/// replies follow the format of the last frame it sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Text,
    Binary,
}

/// An open websocket connection
#[derive(Debug)]
pub struct Connection {
    /// Identifier assigned by the server, also used as the player id
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Last time any frame arrived from this connection
    pub last_seen: Instant,
    pub format: FrameFormat,
    sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            connected_at: now,
            last_seen: now,
            format: FrameFormat::Text,
            sender,
        }
    }

    /// Queues a frame for the writer task. Fails once the writer has gone away.
    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Lazily encoded copies of one event, one per frame format.
struct EncodedEvent<'a> {
    event: &'a ServerEvent,
    text: Option<Option<String>>,
    binary: Option<Option<Vec<u8>>>,
}

impl<'a> EncodedEvent<'a> {
    fn new(event: &'a ServerEvent) -> Self {
        Self {
            event,
            text: None,
            binary: None,
        }
    }

    fn message(&mut self, format: FrameFormat) -> Option<Message> {
        let event = self.event;
        match format {
            FrameFormat::Text => self
                .text
                .get_or_insert_with(|| match encode_text(event) {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!("Failed to encode {:?} as JSON: {}", event, e);
                        None
                    }
                })
                .clone()
                .map(Message::Text),
            FrameFormat::Binary => self
                .binary
                .get_or_insert_with(|| match encode_binary(event) {
                    Ok(data) => Some(data),
                    Err(e) => {
                        warn!("Failed to encode {:?} as bincode: {}", event, e);
                        None
                    }
                })
                .clone()
                .map(Message::Binary),
        }
    }
}

/// Manages all open connections and their outgoing channels
pub struct ConnectionManager {
    connections: HashMap<ConnectionId, Connection>,
    /// Next id to hand out; ids are never reused within a process
    next_connection_id: ConnectionId,
    max_connections: usize,
}

impl ConnectionManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Registers a connection, returning its id, or `None` when at capacity.
    pub fn add_connection(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Option<ConnectionId> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;

        info!("Connection {} opened from {}", connection_id, addr);
        self.connections
            .insert(connection_id, Connection::new(connection_id, addr, sender));

        Some(connection_id)
    }

    pub fn remove_connection(&mut self, connection_id: &ConnectionId) -> bool {
        if let Some(connection) = self.connections.remove(connection_id) {
            info!(
                "Connection {} closed after {:?}",
                connection.id,
                connection.connected_at.elapsed()
            );
            true
        } else {
            false
        }
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Records activity and the frame format the connection last used.
    pub fn touch(&mut self, connection_id: ConnectionId, format: FrameFormat) {
        if let Some(connection) = self.connections.get_mut(&connection_id) {
            connection.last_seen = Instant::now();
            connection.format = format;
        }
    }

    /// Sends one event to one connection in its current frame format.
    pub fn send_event(&self, connection_id: ConnectionId, event: &ServerEvent) -> bool {
        let Some(connection) = self.connections.get(&connection_id) else {
            return false;
        };
        EncodedEvent::new(event)
            .message(connection.format)
            .map(|message| connection.send(message))
            .unwrap_or(false)
    }

    /// Delivers relay output in order and returns how many frames were queued.
    ///
    /// Recipients that have already disconnected are skipped.
    pub fn deliver(&self, batch: &[Outbound]) -> usize {
        let mut sent = 0;

        for outbound in batch {
            let mut encoded = EncodedEvent::new(&outbound.event);
            for id in &outbound.recipients {
                let Some(connection) = self.connections.get(id) else {
                    debug!("Skipping departed connection {}", id);
                    continue;
                };
                if let Some(message) = encoded.message(connection.format) {
                    if connection.send(message) {
                        sent += 1;
                    }
                }
            }
        }

        sent
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
