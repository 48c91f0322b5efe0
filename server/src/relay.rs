//! Maps client events onto room mutations and the facts to fan out.
//!
//! The relay never touches a socket. Each call returns the outbound batch in
//! the order it must be delivered, with recipients already resolved against
//! the room as it stands right after the mutation.

use crate::error::RelayError;
use crate::registry::{Departure, RoomRegistry};
use crate::room::Room;
use log::{debug, info, warn};
use shared::{ClientEvent, ConnectionId, Player, RoomCode, ServerEvent};
use std::time::{Duration, Instant};

/// Who receives a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Sender,
    RoomExceptSender,
    Room,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub audience: Audience,
    pub recipients: Vec<ConnectionId>,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn sender(sender: ConnectionId, event: ServerEvent) -> Self {
        Self {
            audience: Audience::Sender,
            recipients: vec![sender],
            event,
        }
    }

    pub fn room(room: &Room, event: ServerEvent) -> Self {
        Self {
            audience: Audience::Room,
            recipients: room.player_ids(),
            event,
        }
    }

    pub fn room_except(room: &Room, sender: ConnectionId, event: ServerEvent) -> Self {
        Self {
            audience: Audience::RoomExceptSender,
            recipients: room
                .players
                .iter()
                .map(|p| p.id)
                .filter(|id| *id != sender)
                .collect(),
            event,
        }
    }
}

/// Authorization checks layered on top of the plain relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPolicy {
    /// Room-scoped events other than join and the read-only queries must come
    /// from a player seated in that room.
    pub require_membership: bool,
    /// Only the player holding the turn may end it.
    pub enforce_turn_order: bool,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            require_membership: true,
            enforce_turn_order: false,
        }
    }
}

impl RelayPolicy {
    /// Accepts any event from any connection.
    pub fn open() -> Self {
        Self {
            require_membership: false,
            enforce_turn_order: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Relay {
    policy: RelayPolicy,
}

fn player_list(room: &Room) -> ServerEvent {
    ServerEvent::PlayerList {
        room_code: room.code.clone(),
        players: room.players.clone(),
    }
}

fn departure_list(departure: &Departure) -> ServerEvent {
    ServerEvent::PlayerList {
        room_code: departure.code.clone(),
        players: departure.remaining.clone(),
    }
}

fn remaining_ids(players: &[Player]) -> Vec<ConnectionId> {
    players.iter().map(|p| p.id).collect()
}

impl Relay {
    pub fn new(policy: RelayPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RelayPolicy {
        self.policy
    }

    /// Handles one client event.
    ///
    /// Rejections are turned into a single sender-only error event; a
    /// rejected event never leaves a partial mutation behind.
    pub fn handle(
        &self,
        registry: &mut RoomRegistry,
        sender: ConnectionId,
        event: ClientEvent,
        now: Instant,
    ) -> Vec<Outbound> {
        let name = event.name();
        match event.room_code() {
            Some(code) => debug!("Connection {} sent {} for room {}", sender, name, code),
            None => debug!("Connection {} sent {}", sender, name),
        }

        match self.dispatch(registry, sender, event, now) {
            Ok(outbound) => outbound,
            Err(err) => {
                match &err {
                    RelayError::PlayerNotFound { .. } | RelayError::EmptyRoom(_) => {
                        warn!("Rejected {} from connection {}: {}", name, sender, err)
                    }
                    _ => info!("Rejected {} from connection {}: {}", name, sender, err),
                }
                vec![Outbound::sender(sender, err.to_event())]
            }
        }
    }

    fn dispatch(
        &self,
        registry: &mut RoomRegistry,
        sender: ConnectionId,
        event: ClientEvent,
        now: Instant,
    ) -> Result<Vec<Outbound>, RelayError> {
        let mut out = Vec::new();

        match event {
            ClientEvent::CreateGame { player_name } => {
                let code = registry.create_room(sender, &player_name)?;
                let room = registry.room_mut(&code)?;
                room.touch(now);
                out.push(Outbound::sender(
                    sender,
                    ServerEvent::GameCreated {
                        room_code: code.clone(),
                    },
                ));
                out.push(Outbound::room(room, player_list(room)));
            }

            ClientEvent::JoinGame {
                room_code,
                player_name,
            } => {
                let room = registry.join_room(&room_code, sender, &player_name)?;
                let list = player_list(room);
                out.push(Outbound::sender(
                    sender,
                    ServerEvent::JoinedGame {
                        room_code: room_code.clone(),
                    },
                ));
                out.push(Outbound::sender(sender, list.clone()));
                out.push(Outbound::room_except(room, sender, list));
                registry.room_mut(&room_code)?.touch(now);
            }

            ClientEvent::LeaveGame { room_code } => {
                self.check_member(registry.room_mut(&room_code)?, sender)?;
                let departure = registry.leave_room(&room_code, sender)?;
                out.push(Outbound::sender(
                    sender,
                    ServerEvent::LeftGame {
                        room_code: room_code.clone(),
                    },
                ));
                if let Some(room) = registry.get_room_mut(&room_code) {
                    room.touch(now);
                    out.push(Outbound::room(room, departure_list(&departure)));
                }
            }

            ClientEvent::GetPlayerList { room_code } => {
                let room = registry.room_mut(&room_code)?;
                out.push(Outbound::sender(sender, player_list(room)));
            }

            ClientEvent::GetRoomInfo { room_code } => {
                let room = registry.room_mut(&room_code)?;
                out.push(Outbound::sender(
                    sender,
                    ServerEvent::RoomInfo {
                        room: room.snapshot(),
                    },
                ));
            }

            ClientEvent::PlayerReady { room_code } => {
                let room = registry.room_mut(&room_code)?;
                room.mark_ready(sender)?;
                room.touch(now);
                out.push(Outbound::room(room, player_list(room)));
                if room.all_ready() {
                    info!("All players ready in room {}", room.code);
                    out.push(Outbound::room(
                        room,
                        ServerEvent::AllPlayersReady {
                            room_code: room.code.clone(),
                        },
                    ));
                }
            }

            ClientEvent::GameStart { room_code } => {
                self.check_member(registry.room_mut(&room_code)?, sender)?;
                let room = registry.start_game(&room_code)?;
                info!(
                    "Game started in room {} with {} players",
                    room.code,
                    room.players.len()
                );
                let event = ServerEvent::GameStart {
                    room_code: room.code.clone(),
                    board: room.board.clone().unwrap_or_default(),
                    ports: room.ports.clone().unwrap_or_default(),
                    turn_index: room.turn_index,
                };
                out.push(Outbound::room(room, event));
                registry.room_mut(&room_code)?.touch(now);
            }

            ClientEvent::EndTurn { room_code } => {
                let room = registry.room_mut(&room_code)?;
                self.check_member(room, sender)?;
                if self.policy.enforce_turn_order
                    && room.current_player().map(|p| p.id) != Some(sender)
                {
                    return Err(RelayError::NotYourTurn {
                        code: room_code,
                        connection: sender,
                    });
                }
                let turn_index = room.advance_turn()?;
                let player_id = room.players[turn_index].id;
                room.touch(now);
                out.push(Outbound::room(
                    room,
                    ServerEvent::TurnChanged {
                        room_code,
                        turn_index,
                        player_id,
                    },
                ));
            }

            ClientEvent::BuildRoad {
                room_code,
                position,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                out.push(Outbound::room_except(
                    room,
                    sender,
                    ServerEvent::RoadBuilt {
                        room_code,
                        player_id: sender,
                        position,
                    },
                ));
            }

            ClientEvent::BuildSettlement {
                room_code,
                position,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                out.push(Outbound::room_except(
                    room,
                    sender,
                    ServerEvent::SettlementBuilt {
                        room_code,
                        player_id: sender,
                        position,
                    },
                ));
            }

            ClientEvent::BuildCity {
                room_code,
                position,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                out.push(Outbound::room_except(
                    room,
                    sender,
                    ServerEvent::CityBuilt {
                        room_code,
                        player_id: sender,
                        position,
                    },
                ));
            }

            ClientEvent::UpdatePoints {
                room_code,
                player_id,
                points,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                room.player_mut(player_id)?.points = points;
                out.push(Outbound::room(
                    room,
                    ServerEvent::PointsUpdated {
                        room_code,
                        player_id,
                        points,
                    },
                ));
            }

            ClientEvent::UpdateLongestRoad {
                room_code,
                player_id,
                length,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                room.player_mut(player_id)?.longest_road = length;
                out.push(Outbound::room(
                    room,
                    ServerEvent::LongestRoadUpdated {
                        room_code,
                        player_id,
                        length,
                    },
                ));
            }

            ClientEvent::UpdateRobberUsed {
                room_code,
                player_id,
                count,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                room.player_mut(player_id)?.robber_used = count;
                out.push(Outbound::room(
                    room,
                    ServerEvent::RobberUsedUpdated {
                        room_code,
                        player_id,
                        count,
                    },
                ));
            }

            ClientEvent::UpdateResources {
                room_code,
                player_id,
                resources,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                room.player_mut(player_id)?.resources = resources;
                out.push(Outbound::room(
                    room,
                    ServerEvent::ResourcesUpdated {
                        room_code,
                        player_id,
                        resources,
                    },
                ));
            }

            ClientEvent::UpdateDevCards {
                room_code,
                player_id,
                dev_cards,
                new_dev_cards,
                played_dev_card,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                let player = room.player_mut(player_id)?;
                player.dev_cards = dev_cards.clone();
                player.new_dev_cards = new_dev_cards.clone();
                player.played_dev_card = played_dev_card;
                out.push(Outbound::room(
                    room,
                    ServerEvent::DevCardsUpdated {
                        room_code,
                        player_id,
                        dev_cards,
                        new_dev_cards,
                        played_dev_card,
                    },
                ));
            }

            ClientEvent::UpdateInventory {
                room_code,
                player_id,
                inventory,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                room.player_mut(player_id)?.inventory = inventory;
                out.push(Outbound::room(
                    room,
                    ServerEvent::InventoryUpdated {
                        room_code,
                        player_id,
                        inventory,
                    },
                ));
            }

            ClientEvent::UpdateAwards {
                room_code,
                player_id,
                knights_played,
                has_longest_road,
                has_largest_army,
            } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                let player = room.player_mut(player_id)?;
                player.knights_played = knights_played;
                player.has_longest_road = has_longest_road;
                player.has_largest_army = has_largest_army;
                out.push(Outbound::room(
                    room,
                    ServerEvent::AwardsUpdated {
                        room_code,
                        player_id,
                        knights_played,
                        has_longest_road,
                        has_largest_army,
                    },
                ));
            }

            ClientEvent::PlaceRobber { room_code, tile_id } => {
                let room = self.member_room(registry, &room_code, sender, now)?;
                room.robber_tile = Some(tile_id);
                out.push(Outbound::room(
                    room,
                    ServerEvent::RobberPlaced {
                        room_code,
                        tile_id,
                        player_id: sender,
                    },
                ));
            }
        }

        Ok(out)
    }

    /// Drops a closing connection from every room and tells the rest of each room.
    pub fn disconnect(
        &self,
        registry: &mut RoomRegistry,
        connection: ConnectionId,
        now: Instant,
    ) -> Vec<Outbound> {
        registry
            .remove_connection(connection)
            .into_iter()
            .filter_map(|departure| {
                if departure.closed {
                    info!(
                        "Room {} closed after connection {} left",
                        departure.code, connection
                    );
                    return None;
                }
                if let Some(room) = registry.get_room_mut(&departure.code) {
                    room.touch(now);
                }
                Some(Outbound {
                    audience: Audience::Room,
                    recipients: remaining_ids(&departure.remaining),
                    event: departure_list(&departure),
                })
            })
            .collect()
    }

    /// Reclaims idle rooms and notifies whoever was still seated in them.
    pub fn sweep(
        &self,
        registry: &mut RoomRegistry,
        now: Instant,
        timeout: Duration,
    ) -> Vec<Outbound> {
        registry
            .sweep_idle(now, timeout)
            .into_iter()
            .map(|room| Outbound {
                audience: Audience::Room,
                recipients: room.player_ids(),
                event: ServerEvent::RoomClosed { room_code: room.code },
            })
            .collect()
    }

    fn check_member(&self, room: &Room, sender: ConnectionId) -> Result<(), RelayError> {
        if self.policy.require_membership && !room.contains(sender) {
            return Err(RelayError::NotInRoom {
                code: room.code.clone(),
                connection: sender,
            });
        }
        Ok(())
    }

    fn member_room<'a>(
        &self,
        registry: &'a mut RoomRegistry,
        code: &RoomCode,
        sender: ConnectionId,
        now: Instant,
    ) -> Result<&'a mut Room, RelayError> {
        let room = registry.room_mut(code)?;
        self.check_member(room, sender)?;
        room.touch(now);
        Ok(room)
    }
}
