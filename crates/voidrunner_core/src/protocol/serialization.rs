//! Packet encode/decode.
//!
//! [`PacketWriter`] and [`PacketReader`] are the low-level, reusable
//! primitives (bounds-checked primitive writes, a length-prefixed string
//! convention, direct `Pod` reads). [`encode`] and [`decode`] sit on top of
//! them and handle one whole [`Packet`](super::Packet): header, optional RLE
//! pass, and the per-type payload shape from the wire table.

use bytemuck::{bytes_of, Pod};

use crate::error::CoreError;

use super::compression::{compress, decompress};
use super::packets::{
    ChatMessagePayload, ClientInputPayload, EntityState, Packet, PacketHeader, PacketType,
    PlayerInputAck, RoomListEntry, RoomMemberEntry, SnapshotHeader, SnapshotPayload,
};

/// Hard cap on a single datagram's size, matching the framing contract: the
/// transport never fragments, so anything larger is a protocol error.
pub const MAX_DATAGRAM_SIZE: usize = 65536;

/// Writes packet bytes into a reused, fixed-capacity scratch buffer.
///
/// Every `write_*` method is bounds-checked against [`MAX_DATAGRAM_SIZE`]
/// and returns `false` rather than panicking if the buffer is full; callers
/// that emit a logical payload larger than a datagram have a bug, not a
/// network condition, so this is a debug-time signal, not a [`CoreError`].
pub struct PacketWriter {
    buffer: Box<[u8]>,
    position: usize,
}

impl PacketWriter {
    /// Creates a writer with a fresh, zeroed buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: vec![0u8; MAX_DATAGRAM_SIZE].into_boxed_slice(),
            position: 0,
        }
    }

    /// Resets the writer for reuse without reallocating.
    #[inline]
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Number of bytes written so far.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.position
    }

    /// True if nothing has been written yet.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// The bytes written so far.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> bool {
        if self.position + bytes.len() > MAX_DATAGRAM_SIZE {
            return false;
        }
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        true
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) -> bool {
        self.write_bytes(&[value])
    }

    /// Writes a `bool` as one byte (0 or 1).
    pub fn write_bool(&mut self, value: bool) -> bool {
        self.write_u8(u8::from(value))
    }

    /// Writes a u16, little-endian.
    pub fn write_u16(&mut self, value: u16) -> bool {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a u32, little-endian.
    pub fn write_u32(&mut self, value: u32) -> bool {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a length-prefixed string: `u32` byte length, then the bytes.
    pub fn write_lpstring(&mut self, value: &str) -> bool {
        let bytes = value.as_bytes();
        self.write_u32(bytes.len() as u32) && self.write_bytes(bytes)
    }

    /// Writes a `Pod` value's raw bytes, unaligned.
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> bool {
        self.write_bytes(bytes_of(value))
    }
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads packet bytes out of a borrowed buffer.
///
/// Every read is checked against the remaining length; running out of
/// bytes is [`CoreError::DecodeUnderflow`], not a panic.
pub struct PacketReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    /// Creates a reader over `buffer`, starting at offset 0.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Bytes remaining to be read.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Reads `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CoreError> {
        if self.remaining() < n {
            return Err(CoreError::DecodeUnderflow);
        }
        let slice = &self.buffer[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8, CoreError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Reads a byte as a `bool` (any nonzero value is `true`).
    pub fn read_bool(&mut self) -> Result<bool, CoreError> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a u16, little-endian.
    pub fn read_u16(&mut self) -> Result<u16, CoreError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a u32, little-endian.
    pub fn read_u32(&mut self) -> Result<u32, CoreError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a length-prefixed string: `u32` byte length, then the bytes.
    ///
    /// Invalid UTF-8 is replaced lossily rather than treated as a decode
    /// error; lobby display names are cosmetic and never drive authority
    /// decisions.
    pub fn read_lpstring(&mut self) -> Result<String, CoreError> {
        let len = self.read_u32()? as usize;
        if len > self.remaining() {
            return Err(CoreError::OverrunString);
        }
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Reads a `Pod` value out of the next `size_of::<T>()` bytes.
    pub fn read_pod<T: Pod>(&mut self) -> Result<T, CoreError> {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        bytemuck::try_pod_read_unaligned(bytes).map_err(|_| CoreError::PayloadSizeMismatch)
    }
}

/// Encodes a whole packet (header and payload) into a fresh buffer.
///
/// The header carried on `packet` is written verbatim — including its
/// `flags` byte. If the caller has set [`super::packets::FLAG_COMPRESSED`]
/// on that header (the codec never decides this on its own; see
/// [`super::compression`]), the payload is RLE-compressed before being
/// appended.
#[must_use]
pub fn encode(packet: &Packet) -> Vec<u8> {
    let mut body = PacketWriter::new();
    write_payload(&mut body, packet);
    let payload = body.as_slice();

    let header = *packet.header();
    let payload_bytes: std::borrow::Cow<'_, [u8]> = if header.is_compressed() {
        std::borrow::Cow::Owned(compress(payload))
    } else {
        std::borrow::Cow::Borrowed(payload)
    };

    let mut out = Vec::with_capacity(PacketHeader::SIZE + payload_bytes.len());
    out.extend_from_slice(bytes_of(&header));
    out.extend_from_slice(&payload_bytes);
    out
}

fn write_payload(w: &mut PacketWriter, packet: &Packet) {
    match packet {
        Packet::ClientHello(_)
        | Packet::ClientPing(_)
        | Packet::ClientDisconnect(_)
        | Packet::RoomListReq(_) => {}
        Packet::ClientInput(_, input) => {
            w.write_pod(input);
        }
        Packet::ServerWelcome(_, assigned_player_id) => {
            w.write_u8(*assigned_player_id);
        }
        Packet::EntityUpdate(_, snapshot) => {
            let header = SnapshotHeader {
                entity_count: snapshot.entities.len() as u32,
                snapshot_seq: snapshot.snapshot_seq,
                player_ack_count: snapshot.acks.len() as u32,
            };
            w.write_pod(&header);
            for ack in &snapshot.acks {
                w.write_pod(ack);
            }
            for entity in &snapshot.entities {
                w.write_pod(entity);
            }
        }
        Packet::EntitySpawn(_, entity) => {
            w.write_pod(entity);
        }
        Packet::EntityDestroy(_, entity_id) => {
            w.write_u32(*entity_id);
        }
        Packet::ServerPingReply(_, echoed_timestamp) => {
            w.write_u32(*echoed_timestamp);
        }
        Packet::RoomListRes(_, rooms) => {
            w.write_u32(rooms.len() as u32);
            for room in rooms {
                w.write_u32(room.id);
                w.write_lpstring(&room.name);
                w.write_u8(room.cur_players);
                w.write_u8(room.max_players);
                w.write_bool(room.in_game);
            }
        }
        Packet::RoomCreate(_, name, max_players) => {
            w.write_lpstring(name);
            w.write_u8(*max_players);
        }
        Packet::RoomCreated(_, room_id)
        | Packet::RoomJoin(_, room_id)
        | Packet::RoomLeave(_, room_id)
        | Packet::GameStart(_, room_id)
        | Packet::TogglePause(_, room_id) => {
            w.write_u32(*room_id);
        }
        Packet::RoomJoined(_, room_id, name, max_players, host_player_id) => {
            w.write_u32(*room_id);
            w.write_lpstring(name);
            w.write_u8(*max_players);
            w.write_u32(*host_player_id);
        }
        Packet::RoomUpdate(_, room_id, members) => {
            w.write_u32(*room_id);
            w.write_u32(members.len() as u32);
            for member in members {
                w.write_u32(member.id);
                w.write_lpstring(&member.name);
                w.write_bool(member.is_host);
                w.write_bool(member.is_ready);
            }
        }
        Packet::PlayerReady(_, ready) => {
            w.write_bool(*ready);
        }
        Packet::ChatMessage(_, chat) => {
            w.write_u32(chat.sender_id);
            w.write_lpstring(&chat.sender_name);
            w.write_lpstring(&chat.message);
            w.write_u32(chat.room_id);
        }
        Packet::LevelChange(_, level_id) => {
            w.write_u8(*level_id);
        }
        Packet::GameOver(_, total_score) | Packet::GameVictory(_, total_score) => {
            w.write_u32(*total_score);
        }
    }
}

/// Decodes one whole packet (header and payload) out of `buf`.
///
/// Returns [`CoreError::MalformedFrame`] for a bad magic/version, and the
/// relevant [`CoreError`] decode variant for a truncated or oversized
/// payload. A leading, well-formed header with an unrecognized type is
/// [`CoreError::UnknownPacketType`].
pub fn decode(buf: &[u8]) -> Result<Packet, CoreError> {
    if buf.len() < PacketHeader::SIZE {
        return Err(CoreError::MalformedFrame);
    }
    let header: PacketHeader =
        bytemuck::try_pod_read_unaligned(&buf[..PacketHeader::SIZE]).map_err(|_| CoreError::MalformedFrame)?;
    if !header.is_valid() {
        return Err(CoreError::MalformedFrame);
    }

    let raw_payload = &buf[PacketHeader::SIZE..];
    let owned_payload;
    let payload: &[u8] = if header.is_compressed() {
        owned_payload = decompress(raw_payload);
        &owned_payload
    } else {
        raw_payload
    };

    let packet_type = PacketType::from_u16(header.packet_type)
        .ok_or(CoreError::UnknownPacketType { type_id: header.packet_type })?;

    let mut r = PacketReader::new(payload);
    read_payload(packet_type, header, &mut r)
}

fn read_payload(
    packet_type: PacketType,
    header: PacketHeader,
    r: &mut PacketReader<'_>,
) -> Result<Packet, CoreError> {
    Ok(match packet_type {
        PacketType::ClientHello => Packet::ClientHello(header),
        PacketType::ClientInput => Packet::ClientInput(header, r.read_pod::<ClientInputPayload>()?),
        PacketType::ClientPing => Packet::ClientPing(header),
        PacketType::ClientDisconnect => Packet::ClientDisconnect(header),
        PacketType::ServerWelcome => Packet::ServerWelcome(header, r.read_u8()?),
        PacketType::EntityUpdate => {
            let snap_header = r.read_pod::<SnapshotHeader>()?;
            let mut acks = Vec::with_capacity(snap_header.player_ack_count as usize);
            for _ in 0..snap_header.player_ack_count {
                acks.push(r.read_pod::<PlayerInputAck>()?);
            }
            let mut entities = Vec::with_capacity(snap_header.entity_count as usize);
            for _ in 0..snap_header.entity_count {
                entities.push(r.read_pod::<EntityState>()?);
            }
            Packet::EntityUpdate(
                header,
                SnapshotPayload {
                    snapshot_seq: snap_header.snapshot_seq,
                    acks,
                    entities,
                },
            )
        }
        PacketType::EntitySpawn => Packet::EntitySpawn(header, r.read_pod::<EntityState>()?),
        PacketType::EntityDestroy => Packet::EntityDestroy(header, r.read_u32()?),
        PacketType::ServerPingReply => Packet::ServerPingReply(header, r.read_u32()?),
        PacketType::RoomListReq => Packet::RoomListReq(header),
        PacketType::RoomListRes => {
            let count = r.read_u32()?;
            let mut rooms = Vec::with_capacity(count as usize);
            for _ in 0..count {
                rooms.push(RoomListEntry {
                    id: r.read_u32()?,
                    name: r.read_lpstring()?,
                    cur_players: r.read_u8()?,
                    max_players: r.read_u8()?,
                    in_game: r.read_bool()?,
                });
            }
            Packet::RoomListRes(header, rooms)
        }
        PacketType::RoomCreate => {
            let name = r.read_lpstring()?;
            let max_players = r.read_u8()?;
            Packet::RoomCreate(header, name, max_players)
        }
        PacketType::RoomCreated => Packet::RoomCreated(header, r.read_u32()?),
        PacketType::RoomJoin => Packet::RoomJoin(header, r.read_u32()?),
        PacketType::RoomJoined => {
            let room_id = r.read_u32()?;
            let name = r.read_lpstring()?;
            let max_players = r.read_u8()?;
            let host_player_id = r.read_u32()?;
            Packet::RoomJoined(header, room_id, name, max_players, host_player_id)
        }
        PacketType::RoomUpdate => {
            let room_id = r.read_u32()?;
            let count = r.read_u32()?;
            let mut members = Vec::with_capacity(count as usize);
            for _ in 0..count {
                members.push(RoomMemberEntry {
                    id: r.read_u32()?,
                    name: r.read_lpstring()?,
                    is_host: r.read_bool()?,
                    is_ready: r.read_bool()?,
                });
            }
            Packet::RoomUpdate(header, room_id, members)
        }
        PacketType::RoomLeave => Packet::RoomLeave(header, r.read_u32()?),
        PacketType::PlayerReady => Packet::PlayerReady(header, r.read_bool()?),
        PacketType::GameStart => Packet::GameStart(header, r.read_u32()?),
        PacketType::TogglePause => Packet::TogglePause(header, r.read_u32()?),
        PacketType::ChatMessage => Packet::ChatMessage(
            header,
            ChatMessagePayload {
                sender_id: r.read_u32()?,
                sender_name: r.read_lpstring()?,
                message: r.read_lpstring()?,
                room_id: r.read_u32()?,
            },
        ),
        PacketType::LevelChange => Packet::LevelChange(header, r.read_u8()?),
        PacketType::GameOver => Packet::GameOver(header, r.read_u32()?),
        PacketType::GameVictory => Packet::GameVictory(header, r.read_u32()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::packets::FLAG_COMPRESSED;

    #[test]
    fn round_trips_client_input() {
        let header = PacketHeader::new(PacketType::ClientInput, 7, 1000);
        let input = ClientInputPayload {
            player_id: 1,
            input_mask: ClientInputPayload::RIGHT | ClientInputPayload::FIRE,
            charge_level: 0,
            input_seq: 42,
        };
        let packet = Packet::ClientInput(header, input);
        let bytes = encode(&packet);
        let decoded = decode(&bytes).unwrap();
        match decoded {
            Packet::ClientInput(h, i) => {
                assert_eq!(h.seq, 7);
                assert_eq!(i.input_seq, 42);
                assert_eq!(i.input_mask, ClientInputPayload::RIGHT | ClientInputPayload::FIRE);
            }
            other => panic!("expected ClientInput, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_entity_update_snapshot() {
        let header = PacketHeader::new(PacketType::EntityUpdate, 1, 0);
        let entities = vec![
            EntityState { id: 1, x: 10.0, y: 20.0, ..Default::default() },
            EntityState { id: 2, x: -5.0, y: 0.0, ..Default::default() },
        ];
        let acks = vec![PlayerInputAck { player_id: 1, last_processed_input_seq: 9 }];
        let packet = Packet::EntityUpdate(
            header,
            SnapshotPayload { snapshot_seq: 3, acks, entities: entities.clone() },
        );
        let bytes = encode(&packet);
        let decoded = decode(&bytes).unwrap();
        match decoded {
            Packet::EntityUpdate(_, snap) => {
                assert_eq!(snap.snapshot_seq, 3);
                assert_eq!(snap.acks.len(), 1);
                assert_eq!(snap.entities, entities);
            }
            other => panic!("expected EntityUpdate, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_room_list_with_lpstrings() {
        let header = PacketHeader::new(PacketType::RoomListRes, 0, 0);
        let rooms = vec![
            RoomListEntry { id: 1, name: "Alpha".into(), cur_players: 1, max_players: 4, in_game: false },
            RoomListEntry { id: 2, name: "Bravo Squad".into(), cur_players: 4, max_players: 4, in_game: true },
        ];
        let packet = Packet::RoomListRes(header, rooms.clone());
        let bytes = encode(&packet);
        let decoded = decode(&bytes).unwrap();
        match decoded {
            Packet::RoomListRes(_, got) => assert_eq!(got, rooms),
            other => panic!("expected RoomListRes, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_chat_message() {
        let header = PacketHeader::new(PacketType::ChatMessage, 0, 0);
        let chat = ChatMessagePayload {
            sender_id: 3,
            sender_name: "Nova".into(),
            message: "incoming on the left flank".into(),
            room_id: 9,
        };
        let packet = Packet::ChatMessage(header, chat.clone());
        let bytes = encode(&packet);
        match decode(&bytes).unwrap() {
            Packet::ChatMessage(_, got) => {
                assert_eq!(got.sender_name, chat.sender_name);
                assert_eq!(got.message, chat.message);
            }
            other => panic!("expected ChatMessage, got {other:?}"),
        }
    }

    #[test]
    fn large_repetitive_snapshot_round_trips_under_compression() {
        let mut header = PacketHeader::new(PacketType::EntityUpdate, 0, 0);
        header.flags = FLAG_COMPRESSED;
        let entities = (0..64)
            .map(|i| EntityState { id: i, ..Default::default() })
            .collect::<Vec<_>>();
        let packet = Packet::EntityUpdate(
            header,
            SnapshotPayload { snapshot_seq: 1, acks: vec![], entities: entities.clone() },
        );
        let bytes = encode(&packet);
        let uncompressed_len = PacketHeader::SIZE
            + SnapshotHeader::SIZE
            + entities.len() * EntityState::SIZE;
        assert!(bytes.len() < uncompressed_len);
        match decode(&bytes).unwrap() {
            Packet::EntityUpdate(h, snap) => {
                assert!(h.is_compressed());
                assert_eq!(snap.entities, entities);
            }
            other => panic!("expected EntityUpdate, got {other:?}"),
        }
    }

    #[test]
    fn uncompressed_packet_round_trips_with_flag_clear() {
        let header = PacketHeader::new(PacketType::ClientPing, 0, 0);
        let bytes = encode(&Packet::ClientPing(header));
        match decode(&bytes).unwrap() {
            Packet::ClientPing(h) => assert!(!h.is_compressed()),
            other => panic!("expected ClientPing, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let header = PacketHeader::new(PacketType::ClientHello, 0, 0);
        let mut bytes = encode(&Packet::ClientHello(header));
        bytes[0] = 0xFF;
        assert!(matches!(decode(&bytes), Err(CoreError::MalformedFrame)));
    }

    #[test]
    fn rejects_truncated_frame() {
        let header = PacketHeader::new(PacketType::ClientInput, 0, 0);
        let input = ClientInputPayload { player_id: 1, input_mask: 0, charge_level: 0, input_seq: 1 };
        let bytes = encode(&Packet::ClientInput(header, input));
        let truncated = &bytes[..bytes.len() - 1];
        assert!(matches!(decode(truncated), Err(CoreError::DecodeUnderflow)));
    }

    #[test]
    fn rejects_unknown_packet_type() {
        let mut header = PacketHeader::new(PacketType::ClientHello, 0, 0);
        header.packet_type = 0x9999;
        let bytes = bytes_of(&header).to_vec();
        assert!(matches!(
            decode(&bytes),
            Err(CoreError::UnknownPacketType { type_id: 0x9999 })
        ));
    }

    #[test]
    fn lpstring_overrun_is_reported_not_panicked() {
        let mut w = PacketWriter::new();
        w.write_u32(1000);
        let mut r = PacketReader::new(w.as_slice());
        assert!(matches!(r.read_lpstring(), Err(CoreError::OverrunString)));
    }
}
