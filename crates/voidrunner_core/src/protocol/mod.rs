//! # Network Protocol
//!
//! Binary packet definitions for the Voidrunner wire protocol.
//!
//! ## Packet Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ PacketHeader (14 bytes)                                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │ magic(2) version(1) flags(1) type(2) seq(4) timestamp_ms(4)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (variable, datagram capped at 64 KiB)                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design philosophy
//!
//! - Fixed-layout payloads are `Pod` and read/written without allocation.
//! - Variable-length payloads (lobby strings, room/chat lists) are decoded
//!   into owned `String`/`Vec` — lobby traffic is low-frequency, so this
//!   isn't on the hot path.
//! - Every malformed input is a [`crate::error::CoreError`] variant, never a
//!   panic.

mod compression;
mod packets;
mod serialization;

pub use compression::{compress, decompress};
pub use packets::{
    ChatMessagePayload, ClientInputPayload, EntityKind, EntityState, Packet, PacketHeader,
    PacketType, PlayerInputAck, RoomListEntry, RoomMemberEntry, SnapshotHeader, SnapshotPayload,
    FLAG_COMPRESSED, PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use serialization::{decode, encode, PacketReader, PacketWriter, MAX_DATAGRAM_SIZE};
