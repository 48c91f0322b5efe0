//! # Room Relay Server Library
//!
//! This library provides the server side of a multiplayer hex-board game. The
//! server does not adjudicate game rules: it groups websocket connections into
//! short-coded rooms, generates each room's board once, tracks whose turn it
//! is, and relays player actions and counter updates to the right audience.
//!
//! ## Core Responsibilities
//!
//! ### Room Lifecycle
//! Rooms are created on request under a random five character code, filled
//! up to six players in join order, and deleted as soon as the last player
//! leaves or disconnects. Rooms nobody has touched for a configurable idle
//! period are reclaimed by a periodic sweep.
//!
//! ### Player Identity
//! Every player is identified by its connection id and gets the first free
//! color of a fixed palette, falling back to black once the palette runs out.
//!
//! ### Board Generation
//! The first `gameStart` in a room produces a 19-tile board and 12 harbors
//! from a shuffled material pool and roll number table. The layout is kept
//! for the lifetime of the room.
//!
//! ### Event Relay
//! Each incoming event is applied to the room registry and turned into a
//! batch of outgoing events, each addressed to the sender, the whole room or
//! the room minus the sender. Rejected events produce one error event for
//! the sender and leave every room untouched.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! [`network::Server`] owns the [`registry::RoomRegistry`] and the
//! [`client_manager::ConnectionManager`]. Per-connection tasks decode
//! websocket frames and forward them over a channel; the loop handles one
//! event at a time, so a read-modify-broadcast is never interleaved with
//! another.
//!
//! ### Transport
//! One websocket per client. Text frames carry JSON and binary frames carry
//! bincode encodings of the same [`shared::ClientEvent`] and
//! [`shared::ServerEvent`] enums; replies use the format the client last
//! sent.
//!
//! ## Module Organization
//!
//! - `identity`: palette and default player records
//! - `board`: board and harbor generation
//! - `room`: a single room with its turn pointer
//! - `registry`: the table of live rooms and the random source
//! - `relay`: event handling and audience resolution
//! - `client_manager`: connection ids, capacity and outgoing channels
//! - `network`: listener, connection tasks and the main loop
//! - `config`: command line options
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:4000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::bind(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod client_manager;
pub mod config;
pub mod error;
pub mod identity;
pub mod network;
pub mod registry;
pub mod relay;
pub mod room;
pub mod utils;
