//! # Packet Definitions
//!
//! Wire-level packet types for the Voidrunner protocol.
//!
//! ## Zero-Allocation Design
//!
//! Fixed-layout payloads are `Copy`, packed, and `Pod`, enabling zero-copy
//! reads straight out of a recv buffer. Variable-length payloads (lobby
//! strings and lists) are not represented as `Pod` structs here; the codec
//! in [`crate::protocol::serialization`] builds and reads them field by
//! field.

use bytemuck::{Pod, Zeroable};

/// Protocol magic, ASCII `"RT"` as a little-endian u16. Any frame whose
/// header does not carry this value is dropped before it reaches dispatch.
pub const PROTOCOL_MAGIC: u16 = 0x5254;

/// The only protocol version this core speaks.
pub const PROTOCOL_VERSION: u8 = 1;

/// Header flag bit: payload is run-length compressed (§`protocol::compression`).
pub const FLAG_COMPRESSED: u8 = 1 << 0;

/// Packet header present on every datagram.
///
/// Wire layout (packed, little-endian): `magic:u16, version:u8, flags:u8,
/// type:u16, seq:u32, timestamp_ms:u32`.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C, packed)]
pub struct PacketHeader {
    /// Constant [`PROTOCOL_MAGIC`]; any other value drops the frame.
    pub magic: u16,
    /// Constant [`PROTOCOL_VERSION`]; any other value drops the frame.
    pub version: u8,
    /// Bitfield; bit 0 set means the payload is RLE-compressed.
    pub flags: u8,
    /// One of [`PacketType`], stored as its raw `u16`.
    pub packet_type: u16,
    /// Monotonic per-sender sequence number.
    pub seq: u32,
    /// Sender's millisecond clock at send time.
    pub timestamp_ms: u32,
}

impl PacketHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 14;

    /// Builds a header with the standard magic/version already filled in.
    #[inline]
    #[must_use]
    pub const fn new(packet_type: PacketType, seq: u32, timestamp_ms: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            flags: 0,
            packet_type: packet_type as u16,
            seq,
            timestamp_ms,
        }
    }

    /// True if magic and version both match the protocol contract.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }

    /// True if the compressed-payload flag is set.
    #[inline]
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

/// Packet type identifiers, matching the wire table exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum PacketType {
    /// C→S, empty payload: first contact from a new endpoint.
    ClientHello = 0x01,
    /// C→S: one tick's worth of input.
    ClientInput = 0x02,
    /// C→S, empty payload: RTT probe.
    ClientPing = 0x03,
    /// C→S, empty payload: graceful disconnect.
    ClientDisconnect = 0x04,
    /// S→C: assigns the session's playerId.
    ServerWelcome = 0x10,
    /// S→C: a delta world snapshot.
    EntityUpdate = 0x11,
    /// S→C: announces a newly created entity.
    EntitySpawn = 0x12,
    /// S→C: announces an entity's destruction.
    EntityDestroy = 0x13,
    /// S→C: echoes a CLIENT_PING timestamp.
    ServerPingReply = 0x15,
    /// C→S, empty payload: request the room list.
    RoomListReq = 0x22,
    /// S→C: the room list.
    RoomListRes = 0x41,
    /// C→S: create a room.
    RoomCreate = 0x20,
    /// S→C: id of the room just created.
    RoomCreated = 0x32,
    /// C→S: join a room by id.
    RoomJoin = 0x21,
    /// S→C: confirms a join, with room details.
    RoomJoined = 0x30,
    /// S→C: full membership/ready snapshot of a room.
    RoomUpdate = 0x31,
    /// C→S / S→C: leave a room, or announce a departure.
    RoomLeave = 0x33,
    /// C→S: toggle ready state.
    PlayerReady = 0x34,
    /// C→S, S→C: host starts the match.
    GameStart = 0x23,
    /// C→S, S→C: host toggles `PLAYING`/`PAUSED`.
    TogglePause = 0x35,
    /// Both directions: chat line.
    ChatMessage = 0x50,
    /// S→C: level transition.
    LevelChange = 0x60,
    /// S→C: run ended in defeat.
    GameOver = 0x61,
    /// S→C: run ended in victory.
    GameVictory = 0x62,
}

impl PacketType {
    /// Maps a raw wire value back to a [`PacketType`], if recognized.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            0x01 => Self::ClientHello,
            0x02 => Self::ClientInput,
            0x03 => Self::ClientPing,
            0x04 => Self::ClientDisconnect,
            0x10 => Self::ServerWelcome,
            0x11 => Self::EntityUpdate,
            0x12 => Self::EntitySpawn,
            0x13 => Self::EntityDestroy,
            0x15 => Self::ServerPingReply,
            0x22 => Self::RoomListReq,
            0x41 => Self::RoomListRes,
            0x20 => Self::RoomCreate,
            0x32 => Self::RoomCreated,
            0x21 => Self::RoomJoin,
            0x30 => Self::RoomJoined,
            0x31 => Self::RoomUpdate,
            0x33 => Self::RoomLeave,
            0x34 => Self::PlayerReady,
            0x23 => Self::GameStart,
            0x35 => Self::TogglePause,
            0x50 => Self::ChatMessage,
            0x60 => Self::LevelChange,
            0x61 => Self::GameOver,
            0x62 => Self::GameVictory,
            _ => return None,
        })
    }
}

/// Entity type discriminant, shared between [`crate::simulation::ServerEntity`]
/// and the wire [`EntityState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EntityKind {
    /// A player's ship.
    Player = 0,
    /// A projectile fired by a player.
    PlayerMissile = 1,
    /// An enemy ship.
    Monster = 2,
    /// A projectile fired by a monster.
    MonsterMissile = 3,
    /// A short-lived visual effect with no collision.
    Explosion = 4,
    /// A pickup granting a temporary effect.
    Powerup = 5,
    /// A player-equippable secondary weapon entity.
    Module = 6,
}

impl EntityKind {
    /// Maps a raw wire byte back to an [`EntityKind`], if recognized.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Player,
            1 => Self::PlayerMissile,
            2 => Self::Monster,
            3 => Self::MonsterMissile,
            4 => Self::Explosion,
            5 => Self::Powerup,
            6 => Self::Module,
            _ => return None,
        })
    }
}

/// `CLIENT_INPUT` payload: `u8 playerId; u8 inputMask; u8 chargeLevel; u32 inputSeq`.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C, packed)]
pub struct ClientInputPayload {
    /// The sending session's assigned player id.
    pub player_id: u8,
    /// Bitfield: bit0 Up, bit1 Down, bit2 Left, bit3 Right, bit4 Fire.
    pub input_mask: u8,
    /// 0 = no charge held; 1..=5 while charging/releasing a charged shot.
    pub charge_level: u8,
    /// Monotonic per-client input sequence number.
    pub input_seq: u32,
}

impl ClientInputPayload {
    /// Input mask bit: Up.
    pub const UP: u8 = 1 << 0;
    /// Input mask bit: Down.
    pub const DOWN: u8 = 1 << 1;
    /// Input mask bit: Left.
    pub const LEFT: u8 = 1 << 2;
    /// Input mask bit: Right.
    pub const RIGHT: u8 = 1 << 3;
    /// Input mask bit: Fire.
    pub const FIRE: u8 = 1 << 4;

    /// Size in bytes on the wire.
    pub const SIZE: usize = 7;
}

/// `SnapshotHeader`: `u32 entityCount; u32 snapshotSeq; u32 playerAckCount`.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C, packed)]
pub struct SnapshotHeader {
    /// Number of [`EntityState`] records following the ack list.
    pub entity_count: u32,
    /// Monotonic per-room snapshot sequence.
    pub snapshot_seq: u32,
    /// Number of [`PlayerInputAck`] records immediately after this header.
    pub player_ack_count: u32,
}

impl SnapshotHeader {
    /// Size in bytes on the wire.
    pub const SIZE: usize = 12;
}

/// One player's input acknowledgment, piggybacked on a snapshot.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C, packed)]
pub struct PlayerInputAck {
    /// The player this ack is for.
    pub player_id: u8,
    /// The most recent `inputSeq` the server applied for this player.
    pub last_processed_input_seq: u32,
}

impl PlayerInputAck {
    /// Size in bytes on the wire.
    pub const SIZE: usize = 5;
}

/// Wire representation of one entity, as carried in snapshots and spawns.
///
/// Field order is part of the wire contract; do not reorder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct EntityState {
    /// Entity id, stable for the entity's lifetime.
    pub id: u32,
    /// Raw [`EntityKind`] byte.
    pub kind: u8,
    /// X position in world units.
    pub x: f32,
    /// Y position in world units.
    pub y: f32,
    /// X velocity, world units per second.
    pub vx: f32,
    /// Y velocity, world units per second.
    pub vy: f32,
    /// Health, 0..=255.
    pub hp: u8,
    /// Owning player id, or 0 for non-player-owned entities.
    pub player_id: u8,
    /// Ship color/variant index, 0..=4.
    pub player_line: u8,
    /// Charge level for projectiles, or the shield sentinel (99) on a player.
    pub charge_level: u8,
    /// Enemy archetype id, meaningful for MONSTER entities.
    pub enemy_type: u8,
    /// Projectile archetype id, meaningful for missile entities.
    pub projectile_type: u8,
}

impl EntityState {
    /// Size in bytes on the wire.
    pub const SIZE: usize = 27;

    /// Shield charge-level sentinel: a player entity with this charge level
    /// has an active shield.
    pub const SHIELD_SENTINEL: u8 = 99;

    /// Squared-distance epsilon below which position is considered unchanged.
    pub const POSITION_EPSILON: f32 = 0.05;

    /// Squared-distance epsilon below which velocity is considered unchanged.
    pub const VELOCITY_EPSILON: f32 = 0.01;

    /// True if `self` differs from `other` by more than the documented
    /// epsilons in position/velocity, or at all in any categorical field.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dvx = self.vx - other.vx;
        let dvy = self.vy - other.vy;
        if dx * dx + dy * dy > Self::POSITION_EPSILON {
            return true;
        }
        if dvx * dvx + dvy * dvy > Self::VELOCITY_EPSILON {
            return true;
        }
        self.kind != other.kind
            || self.hp != other.hp
            || self.player_id != other.player_id
            || self.player_line != other.player_line
            || self.charge_level != other.charge_level
            || self.enemy_type != other.enemy_type
            || self.projectile_type != other.projectile_type
    }
}

/// One row of a `ROOM_LIST_RES` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomListEntry {
    /// The room's id.
    pub id: u32,
    /// The room's display name.
    pub name: String,
    /// Current member count.
    pub cur_players: u8,
    /// Configured capacity.
    pub max_players: u8,
    /// True once the room has left `WAITING`.
    pub in_game: bool,
}

/// One row of a `ROOM_UPDATE` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomMemberEntry {
    /// The member's player id.
    pub id: u32,
    /// The member's display name.
    pub name: String,
    /// True for exactly one member of a room: its host.
    pub is_host: bool,
    /// True if the member has toggled ready.
    pub is_ready: bool,
}

/// Decoded `ENTITY_UPDATE` body: the header plus its two variable-length
/// tails.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotPayload {
    /// Monotonic per-room snapshot sequence, mirrored from [`SnapshotHeader`].
    pub snapshot_seq: u32,
    /// Input acks piggybacked on this snapshot.
    pub acks: Vec<PlayerInputAck>,
    /// Entities included in this snapshot (new, changed, or all on a full send).
    pub entities: Vec<EntityState>,
}

/// A fully decoded packet, paired with the wire header it arrived under.
///
/// Variant order follows the wire table; see [`PacketType`] for the raw
/// values.
#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    /// `CLIENT_HELLO`.
    ClientHello(PacketHeader),
    /// `CLIENT_INPUT`.
    ClientInput(PacketHeader, ClientInputPayload),
    /// `CLIENT_PING`.
    ClientPing(PacketHeader),
    /// `CLIENT_DISCONNECT`.
    ClientDisconnect(PacketHeader),
    /// `SERVER_WELCOME`.
    ServerWelcome(PacketHeader, u8),
    /// `ENTITY_UPDATE`.
    EntityUpdate(PacketHeader, SnapshotPayload),
    /// `ENTITY_SPAWN`.
    EntitySpawn(PacketHeader, EntityState),
    /// `ENTITY_DESTROY`.
    EntityDestroy(PacketHeader, u32),
    /// `SERVER_PING_REPLY`.
    ServerPingReply(PacketHeader, u32),
    /// `ROOM_LIST_REQ`.
    RoomListReq(PacketHeader),
    /// `ROOM_LIST_RES`.
    RoomListRes(PacketHeader, Vec<RoomListEntry>),
    /// `ROOM_CREATE`.
    RoomCreate(PacketHeader, String, u8),
    /// `ROOM_CREATED`.
    RoomCreated(PacketHeader, u32),
    /// `ROOM_JOIN`.
    RoomJoin(PacketHeader, u32),
    /// `ROOM_JOINED`.
    RoomJoined(PacketHeader, u32, String, u8, u32),
    /// `ROOM_UPDATE`.
    RoomUpdate(PacketHeader, u32, Vec<RoomMemberEntry>),
    /// `ROOM_LEAVE`.
    RoomLeave(PacketHeader, u32),
    /// `PLAYER_READY`.
    PlayerReady(PacketHeader, bool),
    /// `GAME_START`.
    GameStart(PacketHeader, u32),
    /// `TOGGLE_PAUSE`.
    TogglePause(PacketHeader, u32),
    /// `CHAT_MESSAGE`.
    ChatMessage(PacketHeader, ChatMessagePayload),
    /// `LEVEL_CHANGE`.
    LevelChange(PacketHeader, u8),
    /// `GAME_OVER`.
    GameOver(PacketHeader, u32),
    /// `GAME_VICTORY`.
    GameVictory(PacketHeader, u32),
}

impl Packet {
    /// The [`PacketType`] this decoded packet carries.
    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Self::ClientHello(_) => PacketType::ClientHello,
            Self::ClientInput(..) => PacketType::ClientInput,
            Self::ClientPing(_) => PacketType::ClientPing,
            Self::ClientDisconnect(_) => PacketType::ClientDisconnect,
            Self::ServerWelcome(..) => PacketType::ServerWelcome,
            Self::EntityUpdate(..) => PacketType::EntityUpdate,
            Self::EntitySpawn(..) => PacketType::EntitySpawn,
            Self::EntityDestroy(..) => PacketType::EntityDestroy,
            Self::ServerPingReply(..) => PacketType::ServerPingReply,
            Self::RoomListReq(_) => PacketType::RoomListReq,
            Self::RoomListRes(..) => PacketType::RoomListRes,
            Self::RoomCreate(..) => PacketType::RoomCreate,
            Self::RoomCreated(..) => PacketType::RoomCreated,
            Self::RoomJoin(..) => PacketType::RoomJoin,
            Self::RoomJoined(..) => PacketType::RoomJoined,
            Self::RoomUpdate(..) => PacketType::RoomUpdate,
            Self::RoomLeave(..) => PacketType::RoomLeave,
            Self::PlayerReady(..) => PacketType::PlayerReady,
            Self::GameStart(..) => PacketType::GameStart,
            Self::TogglePause(..) => PacketType::TogglePause,
            Self::ChatMessage(..) => PacketType::ChatMessage,
            Self::LevelChange(..) => PacketType::LevelChange,
            Self::GameOver(..) => PacketType::GameOver,
            Self::GameVictory(..) => PacketType::GameVictory,
        }
    }

    /// The wire header this packet was decoded from (or will be sent under).
    #[must_use]
    pub const fn header(&self) -> &PacketHeader {
        match self {
            Self::ClientHello(h)
            | Self::ClientPing(h)
            | Self::ClientDisconnect(h)
            | Self::RoomListReq(h)
            | Self::ClientInput(h, _)
            | Self::ServerWelcome(h, _)
            | Self::EntityUpdate(h, _)
            | Self::EntitySpawn(h, _)
            | Self::EntityDestroy(h, _)
            | Self::ServerPingReply(h, _)
            | Self::RoomCreated(h, _)
            | Self::RoomJoin(h, _)
            | Self::RoomLeave(h, _)
            | Self::GameStart(h, _)
            | Self::TogglePause(h, _)
            | Self::LevelChange(h, _)
            | Self::GameOver(h, _)
            | Self::GameVictory(h, _)
            | Self::RoomListRes(h, _)
            | Self::RoomCreate(h, _, _)
            | Self::PlayerReady(h, _)
            | Self::ChatMessage(h, _)
            | Self::RoomJoined(h, _, _, _, _)
            | Self::RoomUpdate(h, _, _) => h,
        }
    }
}

/// `CHAT_MESSAGE` payload, both directions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessagePayload {
    /// The speaking player's id.
    pub sender_id: u32,
    /// The speaking player's display name, echoed by the server.
    pub sender_name: String,
    /// The message body.
    pub message: String,
    /// The room this message is scoped to.
    pub room_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_matches_wire_contract() {
        assert_eq!(std::mem::size_of::<PacketHeader>(), PacketHeader::SIZE);
    }

    #[test]
    fn client_input_size_matches_wire_contract() {
        assert_eq!(
            std::mem::size_of::<ClientInputPayload>(),
            ClientInputPayload::SIZE
        );
    }

    #[test]
    fn entity_state_size_matches_wire_contract() {
        assert_eq!(std::mem::size_of::<EntityState>(), EntityState::SIZE);
    }

    #[test]
    fn snapshot_header_size_matches_wire_contract() {
        assert_eq!(std::mem::size_of::<SnapshotHeader>(), SnapshotHeader::SIZE);
    }

    #[test]
    fn player_input_ack_size_matches_wire_contract() {
        assert_eq!(std::mem::size_of::<PlayerInputAck>(), PlayerInputAck::SIZE);
    }

    #[test]
    fn header_rejects_wrong_magic_or_version() {
        let mut header = PacketHeader::new(PacketType::ClientHello, 0, 0);
        assert!(header.is_valid());
        header.magic = 0xFFFF;
        assert!(!header.is_valid());
        header.magic = PROTOCOL_MAGIC;
        header.version = 2;
        assert!(!header.is_valid());
    }

    #[test]
    fn packet_type_round_trips_through_raw_value() {
        for &(value, expected) in &[
            (0x01u16, PacketType::ClientHello),
            (0x02, PacketType::ClientInput),
            (0x11, PacketType::EntityUpdate),
            (0x41, PacketType::RoomListRes),
            (0x62, PacketType::GameVictory),
        ] {
            assert_eq!(PacketType::from_u16(value), Some(expected));
        }
        assert_eq!(PacketType::from_u16(0x9999), None);
    }

    #[test]
    fn entity_state_change_detection_respects_epsilons() {
        let base = EntityState {
            id: 1,
            kind: EntityKind::Player as u8,
            x: 100.0,
            y: 100.0,
            vx: 0.0,
            vy: 0.0,
            hp: 100,
            player_id: 1,
            player_line: 0,
            charge_level: 0,
            enemy_type: 0,
            projectile_type: 0,
        };
        let tiny_move = EntityState {
            x: 100.01,
            ..base
        };
        assert!(!base.differs_from(&tiny_move));

        let real_move = EntityState {
            x: 101.0,
            ..base
        };
        assert!(base.differs_from(&real_move));

        let hp_change = EntityState { hp: 99, ..base };
        assert!(base.differs_from(&hp_change));
    }
}
