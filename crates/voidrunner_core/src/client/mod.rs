//! Client-side networking: builds outbound packets, and folds whatever
//! arrives from the server into prediction/interpolation state (§4.H).
//!
//! This module owns no socket. A caller (the bot/test binary, or a future
//! rendering front end) is expected to send the bytes [`GameClient`]'s
//! `*_packet` methods return, and feed back every [`Packet`] it receives via
//! [`GameClient::handle_packet`].

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::PlayerConfig;
use crate::interpolation::RemoteEntityInterpolator;
use crate::prediction::Predictor;
use crate::protocol::{
    self, ChatMessagePayload, ClientInputPayload, EntityKind, Packet, PacketHeader, PacketType,
    RoomListEntry, RoomMemberEntry,
};

fn now_ms() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

/// Connection lifecycle of a [`GameClient`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientState {
    /// No `CLIENT_HELLO` sent yet, or the server never answered it.
    #[default]
    Disconnected,
    /// `CLIENT_HELLO` sent, `SERVER_WELCOME` not yet received.
    Connecting,
    /// `SERVER_WELCOME` received; `playerId` assigned.
    Connected,
}

/// How the client's last match ended, per `GAME_OVER`/`GAME_VICTORY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchResult {
    /// The room's boss was defeated.
    Victory,
    /// No player ships survived.
    Defeat,
}

/// Client-side connection state: one per server connection.
///
/// Builds every outbound packet with a monotonically increasing `seq` and
/// the local millisecond clock, and keeps a [`Predictor`] for the local ship
/// plus a [`RemoteEntityInterpolator`] for everything else.
pub struct GameClient {
    state: ClientState,
    player_id: Option<u8>,
    room_id: u32,
    in_game: bool,
    paused: bool,
    result: Option<MatchResult>,
    members: Vec<RoomMemberEntry>,
    rooms: Vec<RoomListEntry>,
    predictor: Option<Predictor>,
    interpolator: RemoteEntityInterpolator,
    out_seq: u32,
    last_snapshot_seq: u32,
}

impl Default for GameClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GameClient {
    /// Creates a disconnected client with no room or prediction state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ClientState::Disconnected,
            player_id: None,
            room_id: 0,
            in_game: false,
            paused: false,
            result: None,
            members: Vec::new(),
            rooms: Vec::new(),
            predictor: None,
            interpolator: RemoteEntityInterpolator::new(),
            out_seq: 0,
            last_snapshot_seq: 0,
        }
    }

    /// Current connection lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ClientState {
        self.state
    }

    /// The session's assigned player id, once connected.
    #[must_use]
    pub const fn player_id(&self) -> Option<u8> {
        self.player_id
    }

    /// The room currently joined, or 0 for none.
    #[must_use]
    pub const fn room_id(&self) -> u32 {
        self.room_id
    }

    /// True once a `GAME_START` has been received for the joined room and no
    /// `GAME_OVER`/`GAME_VICTORY` has ended it yet.
    #[must_use]
    pub const fn in_game(&self) -> bool {
        self.in_game
    }

    /// How the last match in this room ended, if it has.
    #[must_use]
    pub const fn result(&self) -> Option<MatchResult> {
        self.result
    }

    /// True if the joined room's host has paused the match.
    #[must_use]
    pub const fn paused(&self) -> bool {
        self.paused
    }

    /// The joined room's roster, as of the last `ROOM_UPDATE`.
    #[must_use]
    pub fn members(&self) -> &[RoomMemberEntry] {
        &self.members
    }

    /// The lobby's room list, as of the last `ROOM_LIST_RES`.
    #[must_use]
    pub fn rooms(&self) -> &[RoomListEntry] {
        &self.rooms
    }

    /// The local ship's predicted render position (§4.H step 4).
    #[must_use]
    pub fn predicted_position(&self) -> Option<(f32, f32)> {
        self.predictor.as_ref().map(Predictor::predicted_position)
    }

    /// A remote entity's interpolated render position.
    #[must_use]
    pub fn remote_position(&self, id: u32, local_clock: f64, snapshot_interval: f64) -> Option<(f32, f32)> {
        self.interpolator.interpolated_position(id, local_clock, snapshot_interval)
    }

    fn next_header(&mut self, packet_type: PacketType) -> PacketHeader {
        self.out_seq = self.out_seq.wrapping_add(1);
        PacketHeader::new(packet_type, self.out_seq, now_ms())
    }

    /// Builds the `CLIENT_HELLO` that opens a connection.
    #[must_use]
    pub fn connect_packet(&mut self) -> Vec<u8> {
        self.state = ClientState::Connecting;
        let header = self.next_header(PacketType::ClientHello);
        protocol::encode(&Packet::ClientHello(header))
    }

    /// Builds a `CLIENT_PING` RTT probe.
    #[must_use]
    pub fn ping_packet(&mut self) -> Vec<u8> {
        let header = self.next_header(PacketType::ClientPing);
        protocol::encode(&Packet::ClientPing(header))
    }

    /// Builds a graceful `CLIENT_DISCONNECT`.
    #[must_use]
    pub fn disconnect_packet(&mut self) -> Vec<u8> {
        let header = self.next_header(PacketType::ClientDisconnect);
        protocol::encode(&Packet::ClientDisconnect(header))
    }

    /// Applies one locally sampled input immediately via the [`Predictor`],
    /// and builds the `CLIENT_INPUT` to send. Returns `None` before a
    /// `playerId` has been assigned.
    pub fn input_packet(&mut self, input_mask: u8, charge_level: u8, dt: f32, cfg: &PlayerConfig) -> Option<Vec<u8>> {
        let player_id = self.player_id?;
        let predictor = self.predictor.get_or_insert_with(|| Predictor::new(cfg.spawn_x, cfg.spawn_y_start));
        let input_seq = predictor.apply_input(input_mask, dt, cfg);
        let header = self.next_header(PacketType::ClientInput);
        let payload = ClientInputPayload { player_id, input_mask, charge_level, input_seq };
        Some(protocol::encode(&Packet::ClientInput(header, payload)))
    }

    /// Builds a `ROOM_LIST_REQ`.
    #[must_use]
    pub fn room_list_request(&mut self) -> Vec<u8> {
        let header = self.next_header(PacketType::RoomListReq);
        protocol::encode(&Packet::RoomListReq(header))
    }

    /// Builds a `ROOM_CREATE`.
    #[must_use]
    pub fn create_room_packet(&mut self, name: String, max_players: u8) -> Vec<u8> {
        let header = self.next_header(PacketType::RoomCreate);
        protocol::encode(&Packet::RoomCreate(header, name, max_players))
    }

    /// Builds a `ROOM_JOIN` for `room_id`.
    #[must_use]
    pub fn join_room_packet(&mut self, room_id: u32) -> Vec<u8> {
        let header = self.next_header(PacketType::RoomJoin);
        protocol::encode(&Packet::RoomJoin(header, room_id))
    }

    /// Builds a `ROOM_LEAVE` for the currently joined room.
    #[must_use]
    pub fn leave_room_packet(&mut self) -> Vec<u8> {
        let header = self.next_header(PacketType::RoomLeave);
        protocol::encode(&Packet::RoomLeave(header, self.room_id))
    }

    /// Builds a `PLAYER_READY` toggle.
    #[must_use]
    pub fn ready_packet(&mut self, ready: bool) -> Vec<u8> {
        let header = self.next_header(PacketType::PlayerReady);
        protocol::encode(&Packet::PlayerReady(header, ready))
    }

    /// Builds a `GAME_START` request for the currently joined room. Only the
    /// host's request is honored server-side.
    #[must_use]
    pub fn start_game_packet(&mut self) -> Vec<u8> {
        let header = self.next_header(PacketType::GameStart);
        protocol::encode(&Packet::GameStart(header, self.room_id))
    }

    /// Builds a `TOGGLE_PAUSE` request for the currently joined room. Only
    /// the host's request is honored server-side.
    #[must_use]
    pub fn toggle_pause_packet(&mut self) -> Vec<u8> {
        let header = self.next_header(PacketType::TogglePause);
        protocol::encode(&Packet::TogglePause(header, self.room_id))
    }

    /// Builds a `CHAT_MESSAGE`. `sender_id`/`sender_name` are left blank —
    /// the server fills them in from the sending session before rebroadcast.
    #[must_use]
    pub fn chat_packet(&mut self, message: String) -> Vec<u8> {
        let header = self.next_header(PacketType::ChatMessage);
        let payload = ChatMessagePayload {
            sender_id: 0,
            sender_name: String::new(),
            message,
            room_id: self.room_id,
        };
        protocol::encode(&Packet::ChatMessage(header, payload))
    }

    /// Folds one packet received from the server into client state.
    pub fn handle_packet(&mut self, packet: Packet, local_clock: f64, cfg: &PlayerConfig) {
        match packet {
            Packet::ServerWelcome(_, player_id) => {
                self.player_id = Some(player_id);
                self.state = ClientState::Connected;
                self.predictor = Some(Predictor::new(cfg.spawn_x, cfg.spawn_y_start));
            }
            Packet::EntityUpdate(_, snapshot) => {
                if snapshot.snapshot_seq <= self.last_snapshot_seq {
                    return; // stale or reordered snapshot: reject per §4.H/§8
                }
                self.last_snapshot_seq = snapshot.snapshot_seq;
                if let (Some(player_id), Some(predictor)) = (self.player_id, self.predictor.as_mut()) {
                    if let Some(ack) = snapshot.acks.iter().find(|ack| ack.player_id == player_id) {
                        if let Some(own) = snapshot
                            .entities
                            .iter()
                            .find(|e| e.player_id == player_id && e.kind == EntityKind::Player as u8)
                        {
                            predictor.reconcile(own.x, own.y, ack.last_processed_input_seq, cfg);
                        }
                    }
                }
                for entity in snapshot.entities {
                    if self.is_local_ship(&entity) {
                        continue;
                    }
                    self.interpolator.observe(entity, local_clock);
                }
            }
            Packet::EntitySpawn(_, entity) => {
                if !self.is_local_ship(&entity) {
                    self.interpolator.observe(entity, local_clock);
                }
            }
            Packet::EntityDestroy(_, id) => {
                self.interpolator.forget(id);
            }
            Packet::RoomListRes(_, rooms) => {
                self.rooms = rooms;
            }
            Packet::RoomCreated(_, room_id) | Packet::RoomJoined(_, room_id, _, _, _) => {
                self.room_id = room_id;
            }
            Packet::RoomUpdate(_, room_id, members) => {
                self.room_id = room_id;
                self.members = members;
            }
            Packet::RoomLeave(_, room_id) if room_id == self.room_id => {
                self.room_id = 0;
                self.members.clear();
                self.in_game = false;
            }
            Packet::GameStart(_, room_id) if room_id == self.room_id => {
                self.in_game = true;
                self.paused = false;
                self.result = None;
            }
            Packet::TogglePause(_, room_id) if room_id == self.room_id => {
                self.paused = !self.paused;
            }
            Packet::GameOver(_, room_id) if room_id == self.room_id => {
                self.in_game = false;
                self.result = Some(MatchResult::Defeat);
            }
            Packet::GameVictory(_, room_id) if room_id == self.room_id => {
                self.in_game = false;
                self.result = Some(MatchResult::Victory);
            }
            Packet::ClientDisconnect(_) => {
                self.state = ClientState::Disconnected;
                self.player_id = None;
            }
            _ => {}
        }
    }

    fn is_local_ship(&self, entity: &crate::protocol::EntityState) -> bool {
        self.player_id.is_some_and(|id| entity.player_id == id && entity.kind == EntityKind::Player as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PlayerConfig {
        PlayerConfig::default()
    }

    #[test]
    fn a_fresh_client_is_disconnected_with_no_player_id() {
        let client = GameClient::new();
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(client.player_id().is_none());
    }

    #[test]
    fn welcome_assigns_the_player_id_and_moves_to_connected() {
        let mut client = GameClient::new();
        let _ = client.connect_packet();
        assert_eq!(client.state(), ClientState::Connecting);

        let header = PacketHeader::new(PacketType::ServerWelcome, 1, 0);
        client.handle_packet(Packet::ServerWelcome(header, 3), 0.0, &cfg());

        assert_eq!(client.state(), ClientState::Connected);
        assert_eq!(client.player_id(), Some(3));
        assert_eq!(client.predicted_position(), Some((cfg().spawn_x, cfg().spawn_y_start)));
    }

    #[test]
    fn input_packet_is_withheld_until_a_player_id_is_assigned() {
        let mut client = GameClient::new();
        assert!(client.input_packet(ClientInputPayload::RIGHT, 0, 1.0 / 60.0, &cfg()).is_none());
    }

    #[test]
    fn room_update_replaces_the_roster_and_tracks_the_joined_room() {
        let mut client = GameClient::new();
        let header = PacketHeader::new(PacketType::RoomUpdate, 1, 0);
        let members = vec![RoomMemberEntry { id: 1, name: "Player1".into(), is_host: true, is_ready: false }];
        client.handle_packet(Packet::RoomUpdate(header, 7, members.clone()), 0.0, &cfg());

        assert_eq!(client.room_id(), 7);
        assert_eq!(client.members(), members.as_slice());
    }

    #[test]
    fn game_start_and_game_over_toggle_in_game_and_record_the_result() {
        let mut client = GameClient::new();
        let room_update = PacketHeader::new(PacketType::RoomUpdate, 1, 0);
        client.handle_packet(Packet::RoomUpdate(room_update, 7, vec![]), 0.0, &cfg());

        let start = PacketHeader::new(PacketType::GameStart, 2, 0);
        client.handle_packet(Packet::GameStart(start, 7), 0.0, &cfg());
        assert!(client.in_game());
        assert!(client.result().is_none());

        let victory = PacketHeader::new(PacketType::GameVictory, 3, 0);
        client.handle_packet(Packet::GameVictory(victory, 7), 0.0, &cfg());
        assert!(!client.in_game());
        assert_eq!(client.result(), Some(MatchResult::Victory));
    }

    #[test]
    fn toggle_pause_flips_the_paused_flag_for_the_joined_room_only() {
        let mut client = GameClient::new();
        let room_update = PacketHeader::new(PacketType::RoomUpdate, 1, 0);
        client.handle_packet(Packet::RoomUpdate(room_update, 7, vec![]), 0.0, &cfg());
        assert!(!client.paused());

        let other_room = PacketHeader::new(PacketType::TogglePause, 2, 0);
        client.handle_packet(Packet::TogglePause(other_room, 99), 0.0, &cfg());
        assert!(!client.paused());

        let pause = PacketHeader::new(PacketType::TogglePause, 3, 0);
        client.handle_packet(Packet::TogglePause(pause, 7), 0.0, &cfg());
        assert!(client.paused());

        let resume = PacketHeader::new(PacketType::TogglePause, 4, 0);
        client.handle_packet(Packet::TogglePause(resume, 7), 0.0, &cfg());
        assert!(!client.paused());
    }

    #[test]
    fn remote_entities_are_tracked_separately_from_the_local_ship() {
        let mut client = GameClient::new();
        let welcome = PacketHeader::new(PacketType::ServerWelcome, 1, 0);
        client.handle_packet(Packet::ServerWelcome(welcome, 1), 0.0, &cfg());

        let snapshot_header = PacketHeader::new(PacketType::EntityUpdate, 2, 0);
        let own_ship = crate::protocol::EntityState {
            id: 100,
            kind: EntityKind::Player as u8,
            player_id: 1,
            x: 50.0,
            y: 50.0,
            ..Default::default()
        };
        let other_ship = crate::protocol::EntityState {
            id: 200,
            kind: EntityKind::Player as u8,
            player_id: 2,
            x: 10.0,
            y: 10.0,
            ..Default::default()
        };
        let snapshot = crate::protocol::SnapshotPayload {
            snapshot_seq: 1,
            acks: vec![],
            entities: vec![own_ship, other_ship],
        };
        client.handle_packet(Packet::EntityUpdate(snapshot_header, snapshot), 0.0, &cfg());

        assert!(client.remote_position(100, 0.0, 1.0 / 30.0).is_none());
        assert_eq!(client.remote_position(200, 0.0, 1.0 / 30.0), Some((10.0, 10.0)));
    }

    #[test]
    fn stale_or_duplicate_snapshots_are_rejected() {
        let mut client = GameClient::new();
        let welcome = PacketHeader::new(PacketType::ServerWelcome, 1, 0);
        client.handle_packet(Packet::ServerWelcome(welcome, 1), 0.0, &cfg());

        let newer = crate::protocol::EntityState {
            id: 200,
            kind: EntityKind::Player as u8,
            player_id: 2,
            x: 10.0,
            y: 10.0,
            ..Default::default()
        };
        let header = PacketHeader::new(PacketType::EntityUpdate, 2, 0);
        client.handle_packet(
            Packet::EntityUpdate(header, crate::protocol::SnapshotPayload { snapshot_seq: 5, acks: vec![], entities: vec![newer] }),
            0.0,
            &cfg(),
        );
        assert_eq!(client.remote_position(200, 0.0, 1.0 / 30.0), Some((10.0, 10.0)));

        // A snapshot with an equal or lower seq must be dropped entirely,
        // even though it carries different entity state.
        let stale = crate::protocol::EntityState {
            id: 200,
            kind: EntityKind::Player as u8,
            player_id: 2,
            x: 999.0,
            y: 999.0,
            ..Default::default()
        };
        let stale_header = PacketHeader::new(PacketType::EntityUpdate, 3, 0);
        client.handle_packet(
            Packet::EntityUpdate(stale_header, crate::protocol::SnapshotPayload { snapshot_seq: 5, acks: vec![], entities: vec![stale] }),
            0.0,
            &cfg(),
        );
        assert_eq!(client.remote_position(200, 0.0, 1.0 / 30.0), Some((10.0, 10.0)));
    }
}
