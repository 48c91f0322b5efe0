//! Named events exchanged over a room connection.
//!
//! Every frame carries exactly one event. Events are externally tagged, so the
//! JSON form of a request is `{"joinGame":{"roomCode":"K3Z9Q","playerName":"Ann"}}`
//! and payload-free events are bare strings such as `"allPlayersReady"`.
//! Binary frames carry the same enums encoded with bincode.

use crate::{ConnectionId, HexTile, Inventory, Player, Port, Resources, RoomCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Events sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    CreateGame {
        player_name: String,
    },
    JoinGame {
        room_code: RoomCode,
        player_name: String,
    },
    LeaveGame {
        room_code: RoomCode,
    },
    GetPlayerList {
        room_code: RoomCode,
    },
    GetRoomInfo {
        room_code: RoomCode,
    },
    PlayerReady {
        room_code: RoomCode,
    },
    GameStart {
        room_code: RoomCode,
    },
    EndTurn {
        room_code: RoomCode,
    },
    BuildRoad {
        room_code: RoomCode,
        position: Vec<i32>,
    },
    BuildSettlement {
        room_code: RoomCode,
        position: Vec<i32>,
    },
    BuildCity {
        room_code: RoomCode,
        position: Vec<i32>,
    },
    UpdatePoints {
        room_code: RoomCode,
        player_id: ConnectionId,
        points: u32,
    },
    UpdateLongestRoad {
        room_code: RoomCode,
        player_id: ConnectionId,
        length: u32,
    },
    UpdateRobberUsed {
        room_code: RoomCode,
        player_id: ConnectionId,
        count: u32,
    },
    UpdateResources {
        room_code: RoomCode,
        player_id: ConnectionId,
        resources: Resources,
    },
    UpdateDevCards {
        room_code: RoomCode,
        player_id: ConnectionId,
        dev_cards: Vec<String>,
        new_dev_cards: Vec<String>,
        #[serde(default)]
        played_dev_card: bool,
    },
    UpdateInventory {
        room_code: RoomCode,
        player_id: ConnectionId,
        inventory: Inventory,
    },
    UpdateAwards {
        room_code: RoomCode,
        player_id: ConnectionId,
        knights_played: u32,
        has_longest_road: bool,
        has_largest_army: bool,
    },
    PlaceRobber {
        room_code: RoomCode,
        tile_id: u32,
    },
}

impl ClientEvent {
    /// Room the event targets, if any.
    pub fn room_code(&self) -> Option<&RoomCode> {
        match self {
            ClientEvent::CreateGame { .. } => None,
            ClientEvent::JoinGame { room_code, .. }
            | ClientEvent::LeaveGame { room_code }
            | ClientEvent::GetPlayerList { room_code }
            | ClientEvent::GetRoomInfo { room_code }
            | ClientEvent::PlayerReady { room_code }
            | ClientEvent::GameStart { room_code }
            | ClientEvent::EndTurn { room_code }
            | ClientEvent::BuildRoad { room_code, .. }
            | ClientEvent::BuildSettlement { room_code, .. }
            | ClientEvent::BuildCity { room_code, .. }
            | ClientEvent::UpdatePoints { room_code, .. }
            | ClientEvent::UpdateLongestRoad { room_code, .. }
            | ClientEvent::UpdateRobberUsed { room_code, .. }
            | ClientEvent::UpdateResources { room_code, .. }
            | ClientEvent::UpdateDevCards { room_code, .. }
            | ClientEvent::UpdateInventory { room_code, .. }
            | ClientEvent::UpdateAwards { room_code, .. }
            | ClientEvent::PlaceRobber { room_code, .. } => Some(room_code),
        }
    }

    /// Wire name of the event, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::CreateGame { .. } => "createGame",
            ClientEvent::JoinGame { .. } => "joinGame",
            ClientEvent::LeaveGame { .. } => "leaveGame",
            ClientEvent::GetPlayerList { .. } => "getPlayerList",
            ClientEvent::GetRoomInfo { .. } => "getRoomInfo",
            ClientEvent::PlayerReady { .. } => "playerReady",
            ClientEvent::GameStart { .. } => "gameStart",
            ClientEvent::EndTurn { .. } => "endTurn",
            ClientEvent::BuildRoad { .. } => "buildRoad",
            ClientEvent::BuildSettlement { .. } => "buildSettlement",
            ClientEvent::BuildCity { .. } => "buildCity",
            ClientEvent::UpdatePoints { .. } => "updatePoints",
            ClientEvent::UpdateLongestRoad { .. } => "updateLongestRoad",
            ClientEvent::UpdateRobberUsed { .. } => "updateRobberUsed",
            ClientEvent::UpdateResources { .. } => "updateResources",
            ClientEvent::UpdateDevCards { .. } => "updateDevCards",
            ClientEvent::UpdateInventory { .. } => "updateInventory",
            ClientEvent::UpdateAwards { .. } => "updateAwards",
            ClientEvent::PlaceRobber { .. } => "placeRobber",
        }
    }
}

/// Full view of a room, answered to `getRoomInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_code: RoomCode,
    pub created_at: u64,
    pub players: Vec<Player>,
    pub board: Option<Vec<HexTile>>,
    pub ports: Option<Vec<Port>>,
    pub turn_index: usize,
    pub robber_tile: Option<u32>,
    pub started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    RoomNotFound,
    RoomFull,
    PlayerNotFound,
    NotInRoom,
    NotYourTurn,
    RoomCodeExhausted,
    MalformedEvent,
    ServerFull,
    Internal,
}

/// Events sent by the server.
///
/// Every fact about a room names the room, since one connection may sit in
/// several rooms at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    GameCreated {
        room_code: RoomCode,
    },
    JoinedGame {
        room_code: RoomCode,
    },
    LeftGame {
        room_code: RoomCode,
    },
    PlayerList {
        room_code: RoomCode,
        players: Vec<Player>,
    },
    RoomInfo {
        room: RoomSnapshot,
    },
    AllPlayersReady {
        room_code: RoomCode,
    },
    GameStart {
        room_code: RoomCode,
        board: Vec<HexTile>,
        ports: Vec<Port>,
        turn_index: usize,
    },
    TurnChanged {
        room_code: RoomCode,
        turn_index: usize,
        player_id: ConnectionId,
    },
    RoadBuilt {
        room_code: RoomCode,
        player_id: ConnectionId,
        position: Vec<i32>,
    },
    SettlementBuilt {
        room_code: RoomCode,
        player_id: ConnectionId,
        position: Vec<i32>,
    },
    CityBuilt {
        room_code: RoomCode,
        player_id: ConnectionId,
        position: Vec<i32>,
    },
    PointsUpdated {
        room_code: RoomCode,
        player_id: ConnectionId,
        points: u32,
    },
    LongestRoadUpdated {
        room_code: RoomCode,
        player_id: ConnectionId,
        length: u32,
    },
    RobberUsedUpdated {
        room_code: RoomCode,
        player_id: ConnectionId,
        count: u32,
    },
    ResourcesUpdated {
        room_code: RoomCode,
        player_id: ConnectionId,
        resources: Resources,
    },
    DevCardsUpdated {
        room_code: RoomCode,
        player_id: ConnectionId,
        dev_cards: Vec<String>,
        new_dev_cards: Vec<String>,
        played_dev_card: bool,
    },
    InventoryUpdated {
        room_code: RoomCode,
        player_id: ConnectionId,
        inventory: Inventory,
    },
    AwardsUpdated {
        room_code: RoomCode,
        player_id: ConnectionId,
        knights_played: u32,
        has_longest_road: bool,
        has_largest_army: bool,
    },
    RobberPlaced {
        room_code: RoomCode,
        tile_id: u32,
        player_id: ConnectionId,
    },
    RoomClosed {
        room_code: RoomCode,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl ServerEvent {
    /// The room a fact belongs to, if any.
    pub fn room_code(&self) -> Option<&RoomCode> {
        match self {
            ServerEvent::GameCreated { room_code }
            | ServerEvent::JoinedGame { room_code }
            | ServerEvent::LeftGame { room_code }
            | ServerEvent::PlayerList { room_code, .. }
            | ServerEvent::AllPlayersReady { room_code }
            | ServerEvent::GameStart { room_code, .. }
            | ServerEvent::TurnChanged { room_code, .. }
            | ServerEvent::RoadBuilt { room_code, .. }
            | ServerEvent::SettlementBuilt { room_code, .. }
            | ServerEvent::CityBuilt { room_code, .. }
            | ServerEvent::PointsUpdated { room_code, .. }
            | ServerEvent::LongestRoadUpdated { room_code, .. }
            | ServerEvent::RobberUsedUpdated { room_code, .. }
            | ServerEvent::ResourcesUpdated { room_code, .. }
            | ServerEvent::DevCardsUpdated { room_code, .. }
            | ServerEvent::InventoryUpdated { room_code, .. }
            | ServerEvent::AwardsUpdated { room_code, .. }
            | ServerEvent::RobberPlaced { room_code, .. }
            | ServerEvent::RoomClosed { room_code } => Some(room_code),
            ServerEvent::RoomInfo { room } => Some(&room.room_code),
            ServerEvent::Error { .. } => None,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid text frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid binary frame: {0}")]
    Binary(#[from] bincode::Error),
}

pub fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_text<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

pub fn decode_binary<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
    Ok(bincode::deserialize(data)?)
}

pub fn encode_binary<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serialize(value)?)
}
