//! Player identity and color assignment within a room.

use shared::{Color, ConnectionId, Player};
use std::collections::HashSet;

/// Colors in the order they are handed out.
pub const PALETTE: [Color; 6] = [
    Color::Red,
    Color::Blue,
    Color::White,
    Color::Orange,
    Color::Green,
    Color::Brown,
];

/// Returned once every palette color is in use.
pub const FALLBACK_COLOR: Color = Color::Black;

/// Picks the first palette color not already taken.
///
/// The pick is deterministic: players joining one after another receive the
/// palette entries in order. When the palette is exhausted the fallback color
/// is returned instead of failing, so it may end up shared.
pub fn next_color(used: &HashSet<Color>) -> Color {
    PALETTE
        .iter()
        .copied()
        .find(|color| !used.contains(color))
        .unwrap_or(FALLBACK_COLOR)
}

/// Builds a fresh player record with the next free color.
pub fn new_player(id: ConnectionId, name: &str, used: &HashSet<Color>) -> Player {
    let name = match name.trim() {
        "" => format!("Player {}", id),
        trimmed => trimmed.to_string(),
    };
    Player::new(id, name, next_color(used))
}
