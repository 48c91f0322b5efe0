//! Server network layer handling websocket connections and the main event loop

use crate::client_manager::{ConnectionManager, FrameFormat};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::registry::RoomRegistry;
use crate::relay::Relay;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{
    decode_binary, decode_text, encode_text, ClientEvent, ConnectionId, ErrorCode, ServerEvent,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    /// A websocket handshake completed; the loop answers with the assigned id,
    /// or `None` when the server is full.
    Connected {
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
        reply: oneshot::Sender<Option<ConnectionId>>,
    },
    EventReceived {
        connection_id: ConnectionId,
        event: ClientEvent,
        format: FrameFormat,
    },
    /// A frame that did not decode into a known event.
    MalformedFrame {
        connection_id: ConnectionId,
        format: FrameFormat,
        reason: String,
    },
    Disconnected {
        connection_id: ConnectionId,
    },
    Shutdown,
}

/// The relay server.
///
/// Owns every room and connection record. Connection tasks only decode
/// frames and forward them over `server_tx`, so each event is handled to
/// completion before the next one is looked at.
pub struct Server {
    listener: Arc<TcpListener>,
    config: ServerConfig,
    registry: RoomRegistry,
    connections: ConnectionManager,
    relay: Relay,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = Arc::new(TcpListener::bind(&config.bind_addr).await?);
        info!("Server listening on {}", listener.local_addr()?);

        let registry = match config.seed {
            Some(seed) => {
                info!("Using fixed random seed {}", seed);
                RoomRegistry::with_seed(seed)
            }
            None => RoomRegistry::new(),
        };
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            connections: ConnectionManager::new(config.max_connections),
            relay: Relay::new(config.policy),
            registry,
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle for stopping [`run`](Self::run) from another task.
    pub fn shutdown_sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    fn spawn_acceptor(&self) -> JoinHandle<()> {
        let listener = Arc::clone(&self.listener);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let server_tx = server_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, server_tx).await {
                                debug!("Connection from {} ended with error: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected {
                addr,
                sender,
                reply,
            } => match self.connections.add_connection(addr, sender.clone()) {
                Some(connection_id) => {
                    if reply.send(Some(connection_id)).is_err() {
                        self.connections.remove_connection(&connection_id);
                    }
                }
                None => {
                    warn!("Rejecting connection from {}: server full", addr);
                    let event = ServerEvent::error(ErrorCode::ServerFull, "server is full");
                    if let Ok(text) = encode_text(&event) {
                        let _ = sender.send(Message::Text(text));
                    }
                    let _ = reply.send(None);
                }
            },

            ServerMessage::EventReceived {
                connection_id,
                event,
                format,
            } => {
                self.connections.touch(connection_id, format);
                let outbound =
                    self.relay
                        .handle(&mut self.registry, connection_id, event, Instant::now());
                self.connections.deliver(&outbound);
            }

            ServerMessage::MalformedFrame {
                connection_id,
                format,
                reason,
            } => {
                self.connections.touch(connection_id, format);
                warn!(
                    "Malformed frame from connection {}: {}",
                    connection_id, reason
                );
                self.connections.send_event(
                    connection_id,
                    &ServerEvent::error(ErrorCode::MalformedEvent, reason),
                );
            }

            ServerMessage::Disconnected { connection_id } => {
                if self.connections.remove_connection(&connection_id) {
                    let outbound =
                        self.relay
                            .disconnect(&mut self.registry, connection_id, Instant::now());
                    self.connections.deliver(&outbound);
                }
            }

            ServerMessage::Shutdown => {}
        }
    }

    fn sweep_idle_rooms(&mut self) {
        let Some(timeout) = self.config.idle_timeout else {
            return;
        };
        let outbound = self
            .relay
            .sweep(&mut self.registry, Instant::now(), timeout);
        if !outbound.is_empty() {
            self.connections.deliver(&outbound);
            debug!(
                "Idle sweep closed {} rooms, {} remain",
                outbound.len(),
                self.registry.len()
            );
        }
    }

    /// Runs until a [`ServerMessage::Shutdown`] arrives.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let acceptor = self.spawn_acceptor();

        let mut sweep_interval = interval(self.config.sweep_interval);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately
        sweep_interval.tick().await;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                        Some(message) => self.handle_message(message),
                    }
                },

                _ = sweep_interval.tick() => {
                    self.sweep_idle_rooms();
                },
            }
        }

        acceptor.abort();
        Ok(())
    }
}

fn decode_frame(connection_id: ConnectionId, message: Message) -> Option<ServerMessage> {
    let (format, decoded) = match message {
        Message::Text(text) => (FrameFormat::Text, decode_text::<ClientEvent>(&text)),
        Message::Binary(data) => (FrameFormat::Binary, decode_binary::<ClientEvent>(&data)),
        _ => return None,
    };

    Some(match decoded {
        Ok(event) => ServerMessage::EventReceived {
            connection_id,
            event,
            format,
        },
        Err(e) => ServerMessage::MalformedFrame {
            connection_id,
            format,
            reason: e.to_string(),
        },
    })
}

/// Drives one websocket from handshake to close.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Closes the socket once the server drops its end of the channel
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let (reply_tx, reply_rx) = oneshot::channel();
    if server_tx
        .send(ServerMessage::Connected {
            addr,
            sender: tx,
            reply: reply_tx,
        })
        .is_err()
    {
        return Ok(());
    }

    let Ok(Some(connection_id)) = reply_rx.await else {
        let _ = writer.await;
        return Ok(());
    };

    while let Some(frame) = ws_receiver.next().await {
        let message = match frame {
            Ok(Message::Close(_)) => break,
            Ok(message) => message,
            Err(e) => {
                debug!("Read error on connection {}: {}", connection_id, e);
                break;
            }
        };

        if let Some(forwarded) = decode_frame(connection_id, message) {
            if server_tx.send(forwarded).is_err() {
                break;
            }
        }
    }

    let _ = server_tx.send(ServerMessage::Disconnected { connection_id });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            seed: Some(1),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_decode_text_frame() {
        let frame = Message::Text(r#"{"endTurn":{"roomCode":"AB12C"}}"#.to_string());
        match decode_frame(4, frame) {
            Some(ServerMessage::EventReceived {
                connection_id,
                event: ClientEvent::EndTurn { room_code },
                format,
            }) => {
                assert_eq!(connection_id, 4);
                assert_eq!(room_code.as_str(), "AB12C");
                assert_eq!(format, FrameFormat::Text);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_binary_frame() {
        let event = ClientEvent::CreateGame {
            player_name: "Ann".to_string(),
        };
        let frame = Message::Binary(shared::encode_binary(&event).unwrap());
        match decode_frame(2, frame) {
            Some(ServerMessage::EventReceived {
                event: decoded,
                format,
                ..
            }) => {
                assert_eq!(decoded, event);
                assert_eq!(format, FrameFormat::Binary);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed_frame() {
        let frame = Message::Text(r#"{"launchRockets":{}}"#.to_string());
        assert!(matches!(
            decode_frame(1, frame),
            Some(ServerMessage::MalformedFrame {
                connection_id: 1,
                format: FrameFormat::Text,
                ..
            })
        ));
    }

    #[test]
    fn test_control_frames_are_ignored() {
        assert!(decode_frame(1, Message::Ping(vec![1, 2])).is_none());
        assert!(decode_frame(1, Message::Pong(Vec::new())).is_none());
    }

    #[tokio::test]
    async fn test_bind_and_shutdown() {
        let mut server = Server::bind(local_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.registry().is_empty());

        let shutdown = server.shutdown_sender();
        shutdown.send(ServerMessage::Shutdown).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server.run())
            .await
            .expect("server did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_server_rejects_connection() {
        let mut config = local_config();
        config.max_connections = 0;
        let mut server = Server::bind(config).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        server.handle_message(ServerMessage::Connected {
            addr: "127.0.0.1:9".parse().unwrap(),
            sender: tx,
            reply: reply_tx,
        });

        assert_eq!(reply_rx.await.unwrap(), None);
        match rx.recv().await {
            Some(Message::Text(text)) => assert!(text.contains("serverFull")),
            other => panic!("Unexpected frame: {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }
}
