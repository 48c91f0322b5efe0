//! Integration tests for the room relay
//!
//! These tests start a real server on a loopback port and drive it with
//! websocket clients, checking what each participant actually receives.

use futures::{SinkExt, StreamExt};
use server::config::ServerConfig;
use server::network::{Server, ServerMessage};
use server::relay::RelayPolicy;
use shared::{
    decode_binary, decode_text, encode_binary, encode_text, ClientEvent, Color, ErrorCode,
    Material, RoomCode, ServerEvent,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    shutdown: mpsc::UnboundedSender<ServerMessage>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(ServerMessage::Shutdown);
    }
}

async fn start_server(config: ServerConfig) -> TestServer {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        seed: Some(7),
        ..config
    };
    let mut server = Server::bind(config).await.expect("Failed to bind server");
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_sender();
    tokio::spawn(async move {
        server.run().await.expect("Server loop failed");
    });
    TestServer { addr, shutdown }
}

struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    async fn connect(server: &TestServer) -> Self {
        let url = format!("ws://{}", server.addr);
        let (ws, _) = connect_async(url.as_str())
            .await
            .expect("Failed to connect");
        Self { ws }
    }

    async fn send(&mut self, event: ClientEvent) {
        let text = encode_text(&event).unwrap();
        self.ws.send(Message::Text(text)).await.unwrap();
    }

    async fn send_raw(&mut self, message: Message) {
        self.ws.send(message).await.unwrap();
    }

    async fn next_frame(&mut self) -> Option<Message> {
        loop {
            let frame = timeout(WAIT, self.ws.next())
                .await
                .expect("Timed out waiting for a frame");
            match frame {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(message)) => return Some(message),
            }
        }
    }

    async fn recv(&mut self) -> ServerEvent {
        match self.next_frame().await {
            Some(Message::Text(text)) => decode_text(&text).unwrap(),
            Some(Message::Binary(data)) => decode_binary(&data).unwrap(),
            other => panic!("Expected an event frame, got {:?}", other),
        }
    }

    /// Skips events until one matches.
    async fn recv_until<F: Fn(&ServerEvent) -> bool>(&mut self, matches: F) -> ServerEvent {
        loop {
            let event = self.recv().await;
            if matches(&event) {
                return event;
            }
        }
    }

    async fn create(&mut self, name: &str) -> RoomCode {
        self.send(ClientEvent::CreateGame {
            player_name: name.to_string(),
        })
        .await;
        let code = match self.recv().await {
            ServerEvent::GameCreated { room_code } => room_code,
            other => panic!("Expected gameCreated, got {:?}", other),
        };
        assert!(matches!(self.recv().await, ServerEvent::PlayerList { .. }));
        code
    }

    async fn join(&mut self, code: &RoomCode, name: &str) {
        self.send(ClientEvent::JoinGame {
            room_code: code.clone(),
            player_name: name.to_string(),
        })
        .await;
        assert!(matches!(self.recv().await, ServerEvent::JoinedGame { .. }));
        assert!(matches!(self.recv().await, ServerEvent::PlayerList { .. }));
    }

    async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

fn expect_error(event: ServerEvent) -> ErrorCode {
    match event {
        ServerEvent::Error { code, .. } => code,
        other => panic!("Expected an error event, got {:?}", other),
    }
}

/// ROOM LIFECYCLE TESTS
mod room_tests {
    use super::*;

    #[tokio::test]
    async fn create_room_returns_code_and_solo_list() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;

        ann.send(ClientEvent::CreateGame {
            player_name: "Ann".to_string(),
        })
        .await;

        let code = match ann.recv().await {
            ServerEvent::GameCreated { room_code } => room_code,
            other => panic!("Expected gameCreated, got {:?}", other),
        };
        assert_eq!(code.as_str().len(), 5);
        assert_eq!(RoomCode::parse(code.as_str()).unwrap(), code);

        match ann.recv().await {
            ServerEvent::PlayerList { room_code, players } => {
                assert_eq!(room_code, code);
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].name, "Ann");
                assert_eq!(players[0].color, Color::Red);
                assert_eq!(players[0].inventory.roads, 15);
            }
            other => panic!("Expected playerList, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn joins_get_palette_colors_and_notify_room() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;
        let mut bo = TestClient::connect(&server).await;
        let mut cy = TestClient::connect(&server).await;

        let code = ann.create("Ann").await;
        bo.join(&code, "Bo").await;

        match ann.recv().await {
            ServerEvent::PlayerList { players, .. } => {
                let colors: Vec<Color> = players.iter().map(|p| p.color).collect();
                assert_eq!(colors, vec![Color::Red, Color::Blue]);
            }
            other => panic!("Expected playerList, got {:?}", other),
        }

        cy.join(&code, "Cy").await;
        for client in [&mut ann, &mut bo] {
            match client.recv().await {
                ServerEvent::PlayerList { players, .. } => {
                    assert_eq!(players.len(), 3);
                    assert_eq!(players[2].color, Color::White);
                }
                other => panic!("Expected playerList, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn unknown_room_join_is_rejected() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;
        let mut bo = TestClient::connect(&server).await;
        let code = ann.create("Ann").await;

        bo.send(ClientEvent::JoinGame {
            room_code: RoomCode::new_unchecked("ZZZZZ"),
            player_name: "Bo".to_string(),
        })
        .await;
        assert_eq!(expect_error(bo.recv().await), ErrorCode::RoomNotFound);

        bo.send(ClientEvent::GetPlayerList { room_code: code }).await;
        match bo.recv().await {
            ServerEvent::PlayerList { players, .. } => assert_eq!(players.len(), 1),
            other => panic!("Expected playerList, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn seventh_player_is_turned_away() {
        let server = start_server(ServerConfig::default()).await;
        let mut host = TestClient::connect(&server).await;
        let code = host.create("p1").await;

        let mut guests = Vec::new();
        for n in 2..=6 {
            let mut guest = TestClient::connect(&server).await;
            guest.join(&code, &format!("p{}", n)).await;
            guests.push(guest);
        }

        let mut late = TestClient::connect(&server).await;
        late.send(ClientEvent::JoinGame {
            room_code: code.clone(),
            player_name: "late".to_string(),
        })
        .await;
        assert_eq!(expect_error(late.recv().await), ErrorCode::RoomFull);
    }

    #[tokio::test]
    async fn sole_player_disconnect_removes_room() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;
        let mut watcher = TestClient::connect(&server).await;
        let code = ann.create("Ann").await;
        ann.close().await;

        let mut removed = false;
        for _ in 0..50 {
            watcher
                .send(ClientEvent::GetRoomInfo {
                    room_code: code.clone(),
                })
                .await;
            match watcher.recv().await {
                ServerEvent::Error {
                    code: ErrorCode::RoomNotFound,
                    ..
                } => {
                    removed = true;
                    break;
                }
                ServerEvent::RoomInfo { .. } => sleep(Duration::from_millis(20)).await,
                other => panic!("Unexpected event {:?}", other),
            }
        }
        assert!(removed, "room survived its last player");
    }

    #[tokio::test]
    async fn disconnect_updates_remaining_players() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;
        let mut bo = TestClient::connect(&server).await;
        let code = ann.create("Ann").await;
        bo.join(&code, "Bo").await;
        ann.recv().await;

        bo.close().await;
        match ann.recv().await {
            ServerEvent::PlayerList { room_code, players } => {
                assert_eq!(room_code, code);
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].name, "Ann");
            }
            other => panic!("Expected playerList, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn leave_game_keeps_connection_open() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;
        let mut bo = TestClient::connect(&server).await;
        let code = ann.create("Ann").await;
        bo.join(&code, "Bo").await;
        ann.recv().await;

        bo.send(ClientEvent::LeaveGame {
            room_code: code.clone(),
        })
        .await;
        assert_eq!(
            bo.recv().await,
            ServerEvent::LeftGame {
                room_code: code.clone()
            }
        );
        assert!(matches!(
            ann.recv().await,
            ServerEvent::PlayerList { ref players, .. } if players.len() == 1
        ));

        let other = bo.create("Bo").await;
        assert_ne!(other, code);
    }
}

/// GAME FLOW TESTS
mod game_tests {
    use super::*;

    #[tokio::test]
    async fn start_game_broadcasts_board_to_everyone() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;
        let mut bo = TestClient::connect(&server).await;
        let mut cy = TestClient::connect(&server).await;
        let code = ann.create("Ann").await;
        bo.join(&code, "Bo").await;
        cy.join(&code, "Cy").await;

        ann.send(ClientEvent::GameStart {
            room_code: code.clone(),
        })
        .await;

        let mut boards = Vec::new();
        for client in [&mut ann, &mut bo, &mut cy] {
            match client
                .recv_until(|e| matches!(e, ServerEvent::GameStart { .. }))
                .await
            {
                ServerEvent::GameStart {
                    room_code,
                    board,
                    ports,
                    turn_index,
                } => {
                    assert_eq!(room_code, code);
                    assert_eq!(turn_index, 0);
                    assert_eq!(board.len(), 19);
                    assert_eq!(ports.len(), 12);
                    assert_eq!(
                        board
                            .iter()
                            .filter(|t| t.material == Material::Desert)
                            .count(),
                        2
                    );
                    boards.push(board);
                }
                _ => unreachable!(),
            }
        }
        assert_eq!(boards[0], boards[1]);
        assert_eq!(boards[1], boards[2]);
    }

    #[tokio::test]
    async fn ready_handshake_and_turns() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;
        let mut bo = TestClient::connect(&server).await;
        let code = ann.create("Ann").await;
        bo.join(&code, "Bo").await;
        ann.recv().await;

        ann.send(ClientEvent::PlayerReady {
            room_code: code.clone(),
        })
        .await;
        bo.recv().await;
        ann.recv().await;
        bo.send(ClientEvent::PlayerReady {
            room_code: code.clone(),
        })
        .await;
        for client in [&mut ann, &mut bo] {
            assert!(matches!(client.recv().await, ServerEvent::PlayerList { .. }));
            assert_eq!(
                client.recv().await,
                ServerEvent::AllPlayersReady {
                    room_code: code.clone()
                }
            );
        }

        ann.send(ClientEvent::EndTurn {
            room_code: code.clone(),
        })
        .await;
        for client in [&mut ann, &mut bo] {
            assert!(matches!(
                client.recv().await,
                ServerEvent::TurnChanged { turn_index: 1, .. }
            ));
        }
    }

    #[tokio::test]
    async fn builds_skip_the_builder() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;
        let mut bo = TestClient::connect(&server).await;
        let code = ann.create("Ann").await;
        bo.join(&code, "Bo").await;
        ann.recv().await;

        bo.send(ClientEvent::BuildRoad {
            room_code: code.clone(),
            position: vec![3, 4],
        })
        .await;
        match ann.recv().await {
            ServerEvent::RoadBuilt {
                room_code,
                position,
                ..
            } => {
                assert_eq!(room_code, code);
                assert_eq!(position, vec![3, 4]);
            }
            other => panic!("Expected roadBuilt, got {:?}", other),
        }

        // The builder only hears about later events.
        bo.send(ClientEvent::GetPlayerList { room_code: code }).await;
        assert!(matches!(bo.recv().await, ServerEvent::PlayerList { .. }));
    }

    #[tokio::test]
    async fn outsider_events_are_rejected() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;
        let mut eve = TestClient::connect(&server).await;
        let code = ann.create("Ann").await;

        eve.send(ClientEvent::EndTurn {
            room_code: code.clone(),
        })
        .await;
        assert_eq!(expect_error(eve.recv().await), ErrorCode::NotInRoom);
    }

    #[tokio::test]
    async fn turn_order_is_enforced_when_configured() {
        let config = ServerConfig {
            policy: RelayPolicy {
                require_membership: true,
                enforce_turn_order: true,
            },
            ..ServerConfig::default()
        };
        let server = start_server(config).await;
        let mut ann = TestClient::connect(&server).await;
        let mut bo = TestClient::connect(&server).await;
        let code = ann.create("Ann").await;
        bo.join(&code, "Bo").await;
        ann.recv().await;

        bo.send(ClientEvent::EndTurn {
            room_code: code.clone(),
        })
        .await;
        assert_eq!(expect_error(bo.recv().await), ErrorCode::NotYourTurn);

        ann.send(ClientEvent::EndTurn { room_code: code }).await;
        assert!(matches!(
            bo.recv().await,
            ServerEvent::TurnChanged { turn_index: 1, .. }
        ));
    }
}

/// TRANSPORT TESTS
mod transport_tests {
    use super::*;

    #[tokio::test]
    async fn binary_frames_get_binary_replies() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;

        let event = ClientEvent::CreateGame {
            player_name: "Ann".to_string(),
        };
        ann.send_raw(Message::Binary(encode_binary(&event).unwrap()))
            .await;

        match ann.next_frame().await {
            Some(Message::Binary(data)) => {
                assert!(matches!(
                    decode_binary::<ServerEvent>(&data).unwrap(),
                    ServerEvent::GameCreated { .. }
                ));
            }
            other => panic!("Expected a binary frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_frame_keeps_connection() {
        let server = start_server(ServerConfig::default()).await;
        let mut ann = TestClient::connect(&server).await;

        ann.send_raw(Message::Text("{\"notAnEvent\":{}}".to_string()))
            .await;
        assert_eq!(expect_error(ann.recv().await), ErrorCode::MalformedEvent);

        ann.send_raw(Message::Text("not json at all".to_string()))
            .await;
        assert_eq!(expect_error(ann.recv().await), ErrorCode::MalformedEvent);

        let code = ann.create("Ann").await;
        assert_eq!(code.as_str().len(), 5);
    }

    #[tokio::test]
    async fn over_capacity_connection_is_refused() {
        let config = ServerConfig {
            max_connections: 1,
            ..ServerConfig::default()
        };
        let server = start_server(config).await;
        let mut first = TestClient::connect(&server).await;
        first.create("Ann").await;

        let mut second = TestClient::connect(&server).await;
        assert_eq!(expect_error(second.recv().await), ErrorCode::ServerFull);
        assert!(second.next_frame().await.is_none());
    }
}
