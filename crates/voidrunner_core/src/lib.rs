//! # Voidrunner core
//!
//! The authoritative multiplayer core for Voidrunner, a 2D side-scrolling
//! shoot-em-up. This crate is transport, protocol, and simulation only — it
//! has no rendering or input-device code, and is linked by both the
//! dedicated server binary and any bot/test client.
//!
//! ## Architecture
//!
//! - **Protocol**: a custom binary wire format, bit-packed, built to stay
//!   well under a conservative UDP MTU.
//! - **Transport**: UDP with a per-endpoint session table and timeout sweep;
//!   no retransmission — snapshots are a self-correcting stream, so a lost
//!   packet is superseded by the next one.
//! - **Simulation**: a fixed 60Hz authoritative tick per room. The server is
//!   the single source of truth; a client's input is a request, never an
//!   outcome.
//! - **Prediction**: client-side input prediction with server reconciliation,
//!   so local movement feels instant despite network latency.
//! - **Synchronization**: delta-compressed snapshots, interpolated on the
//!   client for every entity that isn't the local player.
//!
//! ## Security model
//!
//! ```text
//! CLIENT                           SERVER
//!   |                                 |
//!   |--- Input: "move left, fire" --->|
//!   |                                 | <- server simulates and validates
//!   |<-- Snapshot: new world state ---|
//!   |                                 |
//! ```
//!
//! The client never determines outcomes; the server always does.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod config;
pub mod error;
pub mod interpolation;
pub mod prediction;
pub mod protocol;
pub mod room;
pub mod server;
pub mod simulation;
pub mod snapshot;
pub mod transport;

pub use config::{CoreConfig, GameplayConfig};
pub use error::{ConfigError, CoreError};
pub use protocol::{Packet, PacketHeader, PacketType};
pub use room::{Room, RoomManager, RoomState};
pub use simulation::{RoomWorld, ServerEntity};
pub use transport::{Session, SessionTable, UdpTransport};

/// Fixed authoritative simulation rate, ticks per second.
pub const TICK_RATE: u32 = 60;

/// Rate at which the server emits world snapshots, per second.
///
/// Half the tick rate: every other tick's result is broadcast, trading
/// bandwidth for the freshness a full 60Hz broadcast would cost.
pub const SNAPSHOT_RATE: u32 = 30;

/// Conservative upper bound on one UDP datagram, chosen to stay under the
/// smallest common path MTU without fragmentation.
pub const MAX_PACKET_SIZE: usize = 1200;

/// Maximum players in a single room.
pub const MAX_PLAYERS_PER_ROOM: u8 = 8;
