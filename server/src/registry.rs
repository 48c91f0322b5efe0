//! Process-wide table of live rooms.
//!
//! The registry is owned by the server loop and handed to the relay by
//! reference, so every mutation happens on one logical thread. It also owns
//! the random source used for room codes and board layouts; tests seed it.

use crate::error::RelayError;
use crate::room::Room;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ConnectionId, Player, RoomCode, ROOM_CODE_ALPHABET, ROOM_CODE_LEN};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Redraws allowed when a fresh code collides with a live room.
const MAX_CODE_ATTEMPTS: usize = 16;

/// Draws a random uppercase base-36 room code.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    let alphabet = ROOM_CODE_ALPHABET.as_bytes();
    let code: String = (0..ROOM_CODE_LEN)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect();
    RoomCode::new_unchecked(code)
}

/// Outcome of removing one player from one room.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub code: RoomCode,
    pub player: Player,
    /// Players still seated, in turn order.
    pub remaining: Vec<Player>,
    /// True when the room emptied and was deleted.
    pub closed: bool,
}

pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    rng: StdRng,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            rng,
        }
    }

    /// Creates a room seated with its creator and returns the new code.
    pub fn create_room(
        &mut self,
        creator: ConnectionId,
        name: &str,
    ) -> Result<RoomCode, RelayError> {
        let code = self.fresh_code()?;
        let room = Room::new(code.clone(), creator, name);
        self.rooms.insert(code.clone(), room);
        info!("Room {} created by connection {}", code, creator);
        Ok(code)
    }

    fn fresh_code(&mut self) -> Result<RoomCode, RelayError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code(&mut self.rng);
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(RelayError::RoomCodeExhausted {
            attempts: MAX_CODE_ATTEMPTS,
        })
    }

    pub fn get_room(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_room_mut(&mut self, code: &RoomCode) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Like [`get_room_mut`](Self::get_room_mut), mapping absence to an error.
    pub fn room_mut(&mut self, code: &RoomCode) -> Result<&mut Room, RelayError> {
        self.rooms
            .get_mut(code)
            .ok_or_else(|| RelayError::RoomNotFound(code.clone()))
    }

    /// Removes a room. Deleting an absent room does nothing.
    pub fn delete_room(&mut self, code: &RoomCode) -> Option<Room> {
        let room = self.rooms.remove(code);
        if room.is_some() {
            info!("Room {} deleted", code);
        }
        room
    }

    pub fn join_room(
        &mut self,
        code: &RoomCode,
        id: ConnectionId,
        name: &str,
    ) -> Result<&Room, RelayError> {
        let room = self.room_mut(code)?;
        room.add_player(id, name)?;
        info!("Connection {} joined room {}", id, code);
        Ok(&*room)
    }

    /// Generates the layout on first start and resets the turn pointer.
    pub fn start_game(&mut self, code: &RoomCode) -> Result<&Room, RelayError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RelayError::RoomNotFound(code.clone()))?;
        room.start_game(&mut self.rng);
        Ok(&*room)
    }

    /// Removes a player from one room, deleting the room if it empties.
    pub fn leave_room(
        &mut self,
        code: &RoomCode,
        id: ConnectionId,
    ) -> Result<Departure, RelayError> {
        let room = self.room_mut(code)?;
        let player = room.remove_player(id).ok_or(RelayError::NotInRoom {
            code: code.clone(),
            connection: id,
        })?;
        let remaining = room.players.clone();
        let closed = remaining.is_empty();
        if closed {
            self.delete_room(code);
        }

        Ok(Departure {
            code: code.clone(),
            player,
            remaining,
            closed,
        })
    }

    /// Removes a connection from every room it sits in.
    ///
    /// Rooms left without players are deleted before this returns. Results
    /// are ordered by room code.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Vec<Departure> {
        let mut codes: Vec<RoomCode> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.contains(id))
            .map(|(code, _)| code.clone())
            .collect();
        codes.sort();

        codes
            .iter()
            .filter_map(|code| self.leave_room(code, id).ok())
            .collect()
    }

    /// Deletes rooms with no activity for longer than `timeout`.
    pub fn sweep_idle(&mut self, now: Instant, timeout: Duration) -> Vec<Room> {
        let mut idle: Vec<RoomCode> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.is_idle(now, timeout))
            .map(|(code, _)| code.clone())
            .collect();
        idle.sort();

        idle.iter()
            .filter_map(|code| {
                info!("Room {} idle for over {:?}, reclaiming", code, timeout);
                self.rooms.remove(code)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn codes(&self) -> Vec<RoomCode> {
        let mut codes: Vec<RoomCode> = self.rooms.keys().cloned().collect();
        codes.sort();
        codes
    }
}
