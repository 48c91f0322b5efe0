//! A single game room: its players, generated layout and turn state.

use crate::board::{generate_board, generate_ports};
use crate::error::RelayError;
use crate::identity::new_player;
use crate::utils::get_timestamp;
use rand::Rng;
use shared::{
    Color, ConnectionId, HexTile, Player, Port, RoomCode, RoomSnapshot, MAX_PLAYERS,
};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Room {
    pub code: RoomCode,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Join order, which is also turn order.
    pub players: Vec<Player>,
    pub board: Option<Vec<HexTile>>,
    pub ports: Option<Vec<Port>>,
    /// Always within `0..players.len()` while the room exists.
    pub turn_index: usize,
    pub robber_tile: Option<u32>,
    pub started: bool,
    pub last_activity: Instant,
}

impl Room {
    /// Creates a room around its first player, who gets the first palette color.
    pub fn new(code: RoomCode, creator: ConnectionId, name: &str) -> Self {
        let player = new_player(creator, name, &HashSet::new());
        Self {
            code,
            created_at: get_timestamp(),
            players: vec![player],
            board: None,
            ports: None,
            turn_index: 0,
            robber_tile: None,
            started: false,
            last_activity: Instant::now(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    pub fn player_ids(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn player(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: ConnectionId) -> Result<&mut Player, RelayError> {
        let code = self.code.clone();
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RelayError::PlayerNotFound { code, player: id })
    }

    pub fn used_colors(&self) -> HashSet<Color> {
        self.players.iter().map(|p| p.color).collect()
    }

    /// Appends a player with the next free color.
    ///
    /// Joining a room the connection already plays in leaves the room as is.
    pub fn add_player(&mut self, id: ConnectionId, name: &str) -> Result<&Player, RelayError> {
        if let Some(index) = self.players.iter().position(|p| p.id == id) {
            return Ok(&self.players[index]);
        }
        if self.is_full() {
            return Err(RelayError::RoomFull {
                code: self.code.clone(),
                capacity: MAX_PLAYERS,
            });
        }

        let player = new_player(id, name, &self.used_colors());
        self.players.push(player);
        Ok(&self.players[self.players.len() - 1])
    }

    /// Removes a player and keeps the turn pointer on a valid seat.
    ///
    /// A departure before the current seat shifts the pointer down so the same
    /// player keeps the turn; when the current player leaves, the turn passes
    /// to whoever now sits at that index (wrapping to the first seat).
    pub fn remove_player(&mut self, id: ConnectionId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let player = self.players.remove(index);

        if index < self.turn_index {
            self.turn_index -= 1;
        }
        if self.turn_index >= self.players.len() {
            self.turn_index = 0;
        }

        Some(player)
    }

    pub fn mark_ready(&mut self, id: ConnectionId) -> Result<(), RelayError> {
        self.player_mut(id)?.is_ready = true;
        Ok(())
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.is_ready)
    }

    /// Generates the board and harbors on first call and resets the turn to seat 0.
    ///
    /// A layout that already exists is kept; restarting never reshuffles it.
    pub fn start_game<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.board.is_none() {
            self.board = Some(generate_board(rng));
        }
        if self.ports.is_none() {
            self.ports = Some(generate_ports(rng));
        }
        self.turn_index = 0;
        self.started = true;
    }

    /// Passes the turn to the next seat.
    pub fn advance_turn(&mut self) -> Result<usize, RelayError> {
        if self.players.is_empty() {
            return Err(RelayError::EmptyRoom(self.code.clone()));
        }
        self.turn_index = (self.turn_index + 1) % self.players.len();
        Ok(self.turn_index)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.turn_index)
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_code: self.code.clone(),
            created_at: self.created_at,
            players: self.players.clone(),
            board: self.board.clone(),
            ports: self.ports.clone(),
            turn_index: self.turn_index,
            robber_tile: self.robber_tile,
            started: self.started,
        }
    }
}
