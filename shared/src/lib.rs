use serde::{Deserialize, Serialize};

pub mod protocol;
pub mod room_code;

pub use protocol::{
    decode_binary, decode_text, encode_binary, encode_text, ClientEvent, CodecError, ErrorCode,
    RoomSnapshot, ServerEvent,
};
pub use room_code::{RoomCode, RoomCodeError, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};

/// Transient per-connection identifier, doubling as the player id inside a room.
pub type ConnectionId = u32;

pub const MAX_PLAYERS: usize = 6;
pub const START_ROADS: u32 = 15;
pub const START_SETTLEMENTS: u32 = 5;
pub const START_CITIES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Blue,
    White,
    Orange,
    Green,
    Brown,
    /// Handed out once every palette color is taken.
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Wood,
    Brick,
    Wheat,
    Sheep,
    Ore,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Wood,
        Resource::Brick,
        Resource::Wheat,
        Resource::Sheep,
        Resource::Ore,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Wood,
    Brick,
    Wheat,
    Sheep,
    Ore,
    Desert,
}

impl From<Resource> for Material {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Wood => Material::Wood,
            Resource::Brick => Material::Brick,
            Resource::Wheat => Material::Wheat,
            Resource::Sheep => Material::Sheep,
            Resource::Ore => Material::Ore,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub wood: u32,
    pub brick: u32,
    pub wheat: u32,
    pub sheep: u32,
    pub ore: u32,
}

impl Resources {
    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Wood => self.wood,
            Resource::Brick => self.brick,
            Resource::Wheat => self.wheat,
            Resource::Sheep => self.sheep,
            Resource::Ore => self.ore,
        }
    }

    pub fn total(&self) -> u32 {
        Resource::ALL.iter().map(|r| self.get(*r)).sum()
    }
}

/// Pieces a player still has in their supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub roads: u32,
    pub settlements: u32,
    pub cities: u32,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            roads: START_ROADS,
            settlements: START_SETTLEMENTS,
            cities: START_CITIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: ConnectionId,
    pub name: String,
    pub color: Color,
    pub resources: Resources,
    pub dev_cards: Vec<String>,
    /// Cards bought this turn; the client decides when they become playable.
    pub new_dev_cards: Vec<String>,
    pub played_dev_card: bool,
    pub inventory: Inventory,
    pub points: u32,
    pub knights_played: u32,
    pub longest_road: u32,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
    pub is_ready: bool,
    pub robber_used: u32,
}

impl Player {
    pub fn new(id: ConnectionId, name: impl Into<String>, color: Color) -> Self {
        Self {
            id,
            name: name.into(),
            color,
            resources: Resources::default(),
            dev_cards: Vec::new(),
            new_dev_cards: Vec::new(),
            played_dev_card: false,
            inventory: Inventory::default(),
            points: 0,
            knights_played: 0,
            longest_road: 0,
            has_longest_road: false,
            has_largest_army: false,
            is_ready: false,
            robber_used: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HexTile {
    pub id: u32,
    pub material: Material,
    pub roll_number: Option<u8>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortRatio {
    #[serde(rename = "2:1")]
    TwoToOne,
    #[serde(rename = "3:1")]
    ThreeToOne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub x: f64,
    pub y: f64,
    pub ratio: PortRatio,
    pub resource: Option<Resource>,
}
