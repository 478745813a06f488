//! Room-partitioned server state and protocol dispatch (§4.D, §4.F, §4.G, §4.I).
//!
//! [`ServerState`] is owned entirely by the simulation thread (§5). It holds
//! the lobby state ([`RoomManager`], [`SessionTable`]) and, for every room
//! that has left `WAITING`, one [`RoomWorld`] and one [`SnapshotCache`].
//! Dispatch methods here never touch the socket directly — they return
//! [`Outbound`] values describing what to send, which the I/O thread turns
//! into actual `send_to` calls.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::{CoreConfig, GameplayConfig};
use crate::protocol::{
    self, ChatMessagePayload, ClientInputPayload, EntityKind, Packet, PacketHeader, PacketType,
    PlayerInputAck, RoomListEntry, RoomMemberEntry,
};
use crate::room::{Room, RoomManager, RoomState};
use crate::simulation::RoomWorld;
use crate::snapshot::SnapshotCache;
use crate::transport::SessionTable;

/// A packet the dispatcher wants sent, addressed but not yet written to the
/// socket.
#[derive(Debug)]
pub enum Outbound {
    /// Sent to exactly one endpoint.
    Unicast(SocketAddr, Vec<u8>),
    /// The same bytes, sent to every listed endpoint.
    Multicast(Vec<SocketAddr>, Vec<u8>),
}

fn now_ms() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

/// The wire table has no packet by which a client sets its own display
/// name, so the server derives one from the assigned player id.
fn player_name(player_id: u8) -> String {
    format!("Player{player_id}")
}

/// Room-partitioned authoritative state plus the dispatch logic that turns
/// decoded packets into simulation effects and outbound replies.
pub struct ServerState {
    core: CoreConfig,
    gameplay: GameplayConfig,
    rooms: RoomManager,
    sessions: SessionTable,
    endpoints: HashMap<u8, SocketAddr>,
    worlds: HashMap<u32, RoomWorld>,
    snapshots: HashMap<u32, SnapshotCache>,
    victory_announced: HashSet<u32>,
    defeat_announced: HashSet<u32>,
    out_seq: u32,
}

impl ServerState {
    /// Creates an empty server with no rooms, sessions, or worlds yet.
    #[must_use]
    pub fn new(core: CoreConfig, gameplay: GameplayConfig) -> Self {
        Self {
            core,
            gameplay,
            rooms: RoomManager::new(),
            sessions: SessionTable::new(),
            endpoints: HashMap::new(),
            worlds: HashMap::new(),
            snapshots: HashMap::new(),
            victory_announced: HashSet::new(),
            defeat_announced: HashSet::new(),
            out_seq: 0,
        }
    }

    fn next_seq(&mut self) -> u32 {
        self.out_seq = self.out_seq.wrapping_add(1);
        self.out_seq
    }

    fn new_header(&mut self, packet_type: PacketType) -> PacketHeader {
        let seq = self.next_seq();
        PacketHeader::new(packet_type, seq, now_ms())
    }

    fn room_addrs(&self, room: &Room) -> Vec<SocketAddr> {
        room.player_ids
            .iter()
            .filter_map(|&pid| {
                let pid_u8 = u8::try_from(pid).unwrap_or(u8::MAX);
                self.endpoints.get(&pid_u8).copied()
            })
            .collect()
    }

    fn room_update_outbound(&mut self, room: &Room) -> Outbound {
        let members = room
            .player_ids
            .iter()
            .map(|&pid| {
                let pid_u8 = u8::try_from(pid).unwrap_or(u8::MAX);
                RoomMemberEntry {
                    id: pid,
                    name: player_name(pid_u8),
                    is_host: pid == room.host_player_id,
                    is_ready: room.is_ready(pid),
                }
            })
            .collect();
        let addrs = self.room_addrs(room);
        let header = self.new_header(PacketType::RoomUpdate);
        let packet = Packet::RoomUpdate(header, room.id, members);
        Outbound::Multicast(addrs, protocol::encode(&packet))
    }

    fn room_list_entries(&self) -> Vec<RoomListEntry> {
        self.rooms
            .list_rooms()
            .into_iter()
            .map(|room| RoomListEntry {
                id: room.id,
                cur_players: u8::try_from(room.player_ids.len()).unwrap_or(u8::MAX),
                max_players: room.max_players,
                in_game: room.state != RoomState::Waiting,
                name: room.name,
            })
            .collect()
    }

    /// Dispatches one decoded, session-bound packet (§4.I). Never panics;
    /// a rejected action is simply dropped — the caller logs nothing beyond
    /// the original receive, matching §7's "malformed/unauthorized input is
    /// counted and discarded, never surfaced as a protocol error reply".
    pub fn handle_packet(&mut self, addr: SocketAddr, packet: Packet, now: Instant) -> Vec<Outbound> {
        let seq = packet.header().seq;
        let player_id = self.sessions.touch_or_create(addr, seq, now);
        self.endpoints.insert(player_id, addr);

        match packet {
            Packet::ClientHello(_) => {
                let header = self.new_header(PacketType::ServerWelcome);
                vec![Outbound::Unicast(addr, protocol::encode(&Packet::ServerWelcome(header, player_id)))]
            }
            Packet::ClientPing(header) => {
                let timestamp_ms = header.timestamp_ms;
                let reply_header = self.new_header(PacketType::ServerPingReply);
                vec![Outbound::Unicast(addr, protocol::encode(&Packet::ServerPingReply(reply_header, timestamp_ms)))]
            }
            Packet::ClientDisconnect(_) => self.handle_disconnect(addr, player_id),
            Packet::ClientInput(_, input) => {
                self.handle_client_input(addr, player_id, input);
                Vec::new()
            }
            Packet::RoomListReq(_) => {
                let entries = self.room_list_entries();
                let header = self.new_header(PacketType::RoomListRes);
                vec![Outbound::Unicast(addr, protocol::encode(&Packet::RoomListRes(header, entries)))]
            }
            Packet::RoomCreate(_, name, max_players) => self.handle_room_create(addr, player_id, &name, max_players),
            Packet::RoomJoin(_, room_id) => self.handle_room_join(addr, player_id, room_id),
            Packet::RoomLeave(_, room_id) => self.handle_room_leave(player_id, room_id),
            Packet::PlayerReady(_, ready) => self.handle_player_ready(player_id, ready),
            Packet::GameStart(_, room_id) => self.handle_game_start(player_id, room_id),
            Packet::TogglePause(_, room_id) => self.handle_toggle_pause(player_id, room_id),
            Packet::ChatMessage(_, chat) => self.handle_chat(player_id, chat),
            // Server-authored types arriving from a client are well-formed
            // but have no defined C→S meaning; drop per §7's "unexpected
            // direction" handling.
            Packet::ServerWelcome(..)
            | Packet::EntityUpdate(..)
            | Packet::EntitySpawn(..)
            | Packet::EntityDestroy(..)
            | Packet::ServerPingReply(..)
            | Packet::RoomListRes(..)
            | Packet::RoomCreated(..)
            | Packet::RoomJoined(..)
            | Packet::RoomUpdate(..)
            | Packet::LevelChange(..)
            | Packet::GameOver(..)
            | Packet::GameVictory(..) => Vec::new(),
        }
    }

    fn handle_room_create(&mut self, addr: SocketAddr, player_id: u8, name: &str, max_players: u8) -> Vec<Outbound> {
        let capped = max_players.clamp(1, self.core.max_player_ships);
        let room_id = self.rooms.create_room(name, capped, u32::from(player_id));
        self.rooms.join_room(room_id, u32::from(player_id));
        self.sessions.set_room(addr, room_id);

        let Some(room) = self.rooms.get_room(room_id) else { return Vec::new() };
        let mut out = Vec::new();
        let created_header = self.new_header(PacketType::RoomCreated);
        out.push(Outbound::Unicast(addr, protocol::encode(&Packet::RoomCreated(created_header, room_id))));
        let joined_header = self.new_header(PacketType::RoomJoined);
        out.push(Outbound::Unicast(
            addr,
            protocol::encode(&Packet::RoomJoined(joined_header, room_id, room.name.clone(), room.max_players, room.host_player_id)),
        ));
        out.push(self.room_update_outbound(&room));
        out
    }

    fn handle_room_join(&mut self, addr: SocketAddr, player_id: u8, room_id: u32) -> Vec<Outbound> {
        if !self.rooms.join_room(room_id, u32::from(player_id)) {
            return Vec::new(); // precondition failed: room missing, full, or not WAITING
        }
        self.sessions.set_room(addr, room_id);

        let Some(room) = self.rooms.get_room(room_id) else { return Vec::new() };
        let mut out = Vec::new();
        let joined_header = self.new_header(PacketType::RoomJoined);
        out.push(Outbound::Unicast(
            addr,
            protocol::encode(&Packet::RoomJoined(joined_header, room_id, room.name.clone(), room.max_players, room.host_player_id)),
        ));
        out.push(self.room_update_outbound(&room));
        out
    }

    fn handle_room_leave(&mut self, player_id: u8, room_id: u32) -> Vec<Outbound> {
        self.rooms.leave_room(room_id, u32::from(player_id));
        if let Some(world) = self.worlds.get_mut(&room_id) {
            world.remove_player_entities(player_id);
        }
        if let Some(endpoint) = self.endpoints.get(&player_id).copied() {
            self.sessions.set_room(endpoint, 0);
        }
        match self.rooms.get_room(room_id) {
            Some(room) => vec![self.room_update_outbound(&room)],
            None => Vec::new(), // room destroyed (left empty)
        }
    }

    fn handle_player_ready(&mut self, player_id: u8, ready: bool) -> Vec<Outbound> {
        let Some(endpoint) = self.endpoints.get(&player_id).copied() else { return Vec::new() };
        let Some(session) = self.sessions.get(endpoint) else { return Vec::new() };
        if session.room_id == 0 || !self.rooms.set_ready(session.room_id, u32::from(player_id), ready) {
            return Vec::new();
        }
        match self.rooms.get_room(session.room_id) {
            Some(room) => vec![self.room_update_outbound(&room)],
            None => Vec::new(),
        }
    }

    fn handle_game_start(&mut self, player_id: u8, room_id: u32) -> Vec<Outbound> {
        let Some(room) = self.rooms.get_room(room_id) else { return Vec::new() };
        let quorum = self.core.min_players_to_start as usize;
        if room.host_player_id != u32::from(player_id) || room.state != RoomState::Waiting || room.player_ids.len() < quorum {
            return Vec::new(); // not host / wrong state / below quorum: ignored per §7
        }
        if !self.rooms.start_game(room_id) {
            return Vec::new();
        }

        let mut world = RoomWorld::new(u64::from(room_id));
        for (index, &pid) in room.player_ids.iter().enumerate() {
            let line = u8::try_from(index % 5).unwrap_or(0);
            world.spawn_player(pid, line, &self.gameplay);
        }
        self.worlds.insert(room_id, world);
        self.snapshots.insert(room_id, SnapshotCache::new());

        let mut out = Vec::new();
        let addrs = self.room_addrs(&room);
        let start_header = self.new_header(PacketType::GameStart);
        out.push(Outbound::Multicast(addrs, protocol::encode(&Packet::GameStart(start_header, room_id))));
        out.extend(self.emit_snapshots_for_room(room_id, true));
        out
    }

    fn handle_toggle_pause(&mut self, player_id: u8, room_id: u32) -> Vec<Outbound> {
        if self.rooms.toggle_pause(room_id, u32::from(player_id)).is_none() {
            return Vec::new(); // not host, or room is WAITING: ignored per §7
        }
        let Some(room) = self.rooms.get_room(room_id) else { return Vec::new() };
        let addrs = self.room_addrs(&room);
        let header = self.new_header(PacketType::TogglePause);
        vec![Outbound::Multicast(addrs, protocol::encode(&Packet::TogglePause(header, room_id)))]
    }

    fn handle_chat(&mut self, player_id: u8, chat: ChatMessagePayload) -> Vec<Outbound> {
        let Some(endpoint) = self.endpoints.get(&player_id).copied() else { return Vec::new() };
        let Some(session) = self.sessions.get(endpoint) else { return Vec::new() };
        if session.room_id == 0 {
            return Vec::new();
        }
        let Some(room) = self.rooms.get_room(session.room_id) else { return Vec::new() };
        let addrs = self.room_addrs(&room);
        let header = self.new_header(PacketType::ChatMessage);
        let payload = ChatMessagePayload {
            sender_id: u32::from(player_id),
            sender_name: player_name(player_id),
            message: chat.message,
            room_id: session.room_id,
        };
        vec![Outbound::Multicast(addrs, protocol::encode(&Packet::ChatMessage(header, payload)))]
    }

    fn handle_client_input(&mut self, addr: SocketAddr, player_id: u8, input: ClientInputPayload) {
        let Some(session) = self.sessions.get(addr) else { return };
        if session.room_id == 0 {
            return;
        }
        let Some(room) = self.rooms.get_room(session.room_id) else { return };
        if room.state != RoomState::Playing {
            return; // input outside PLAYING is dropped per §4.I
        }
        if let Some(world) = self.worlds.get_mut(&session.room_id) {
            // The session, not the client-claimed payload field, is the
            // authority on whose input this is.
            world.apply_input(player_id, input.input_mask, input.charge_level, input.input_seq);
        }
    }

    fn handle_disconnect(&mut self, addr: SocketAddr, player_id: u8) -> Vec<Outbound> {
        let session = self.sessions.remove(addr);
        self.endpoints.remove(&player_id);
        let Some(session) = session else { return Vec::new() };
        if session.room_id == 0 {
            return Vec::new();
        }
        self.rooms.leave_room(session.room_id, u32::from(player_id));
        if let Some(world) = self.worlds.get_mut(&session.room_id) {
            world.remove_player_entities(player_id);
        }
        match self.rooms.get_room(session.room_id) {
            Some(room) => vec![self.room_update_outbound(&room)],
            None => Vec::new(),
        }
    }

    /// Advances every `PLAYING` room's world by one fixed step and collects
    /// the entity lifecycle and match-result announcements it produced
    /// (§4.F). Snapshot emission is a separate, slower-rate operation; see
    /// [`Self::emit_snapshots`].
    pub fn tick(&mut self, dt: f32) -> Vec<Outbound> {
        let any_playing = self.rooms.list_rooms().iter().any(|r| r.state == RoomState::Playing);
        let mut out = Vec::new();
        let room_ids: Vec<u32> = self.worlds.keys().copied().collect();

        for room_id in room_ids {
            let Some(room) = self.rooms.get_room(room_id) else { continue };
            if room.state != RoomState::Playing {
                continue;
            }
            let Some(world) = self.worlds.get_mut(&room_id) else { continue };
            world.tick(dt, &self.gameplay, any_playing);

            let destroyed = world.destroyed_this_tick.clone();
            let spawned = world.spawned_this_tick.clone();
            let total_score = world.total_score();
            let boss_defeated = world.boss_defeated();
            let survivors = world.live_entities().any(|e| e.kind == EntityKind::Player);

            let addrs = self.room_addrs(&room);
            for id in destroyed {
                let header = self.new_header(PacketType::EntityDestroy);
                out.push(Outbound::Multicast(addrs.clone(), protocol::encode(&Packet::EntityDestroy(header, id))));
            }
            for id in spawned {
                if let Some(entity) = self.worlds.get(&room_id).and_then(|w| w.get(id)) {
                    let header = self.new_header(PacketType::EntitySpawn);
                    out.push(Outbound::Multicast(addrs.clone(), protocol::encode(&Packet::EntitySpawn(header, entity.to_wire()))));
                }
            }

            if boss_defeated && self.victory_announced.insert(room_id) {
                let header = self.new_header(PacketType::GameVictory);
                out.push(Outbound::Multicast(addrs.clone(), protocol::encode(&Packet::GameVictory(header, total_score))));
            } else if !survivors && self.defeat_announced.insert(room_id) {
                let header = self.new_header(PacketType::GameOver);
                out.push(Outbound::Multicast(addrs, protocol::encode(&Packet::GameOver(header, total_score))));
            }
        }
        out
    }

    /// Builds and broadcasts this interval's `ENTITY_UPDATE` for every room
    /// with an active world (§4.G). `force_full` forces every live entity
    /// into the payload; used once right after `GAME_START`.
    pub fn emit_snapshots(&mut self, force_full: bool) -> Vec<Outbound> {
        let room_ids: Vec<u32> = self.worlds.keys().copied().collect();
        let mut out = Vec::new();
        for room_id in room_ids {
            out.extend(self.emit_snapshots_for_room(room_id, force_full));
        }
        out
    }

    fn emit_snapshots_for_room(&mut self, room_id: u32, force_full: bool) -> Vec<Outbound> {
        let Some(room) = self.rooms.get_room(room_id) else { return Vec::new() };

        let acks: Vec<PlayerInputAck> = {
            let Some(world) = self.worlds.get(&room_id) else { return Vec::new() };
            room.player_ids
                .iter()
                .map(|&pid| {
                    let pid_u8 = u8::try_from(pid).unwrap_or(u8::MAX);
                    PlayerInputAck { player_id: pid_u8, last_processed_input_seq: world.last_processed_input_seq(pid_u8) }
                })
                .collect()
        };

        let payload = {
            let Some(world) = self.worlds.get(&room_id) else { return Vec::new() };
            let Some(cache) = self.snapshots.get_mut(&room_id) else { return Vec::new() };
            cache.build_update(world.live_entities(), acks, force_full)
        };
        let Some(payload) = payload else { return Vec::new() };

        let addrs = self.room_addrs(&room);
        let header = self.new_header(PacketType::EntityUpdate);
        vec![Outbound::Multicast(addrs, protocol::encode(&Packet::EntityUpdate(header, payload)))]
    }

    /// Reaps sessions silent past [`crate::transport::SESSION_TIMEOUT`]
    /// (§4.D) and announces whatever their departure caused.
    pub fn sweep_timeouts(&mut self, now: Instant) -> Vec<Outbound> {
        let expired = self.sessions.sweep_timeouts(now);
        let mut out = Vec::new();

        for session in expired {
            self.endpoints.remove(&session.player_id);
            if session.room_id == 0 {
                continue;
            }
            self.rooms.leave_room(session.room_id, u32::from(session.player_id));

            let destroyed_ids: Vec<u32> = if let Some(world) = self.worlds.get_mut(&session.room_id) {
                let before = world.destroyed_this_tick.len();
                world.remove_player_entities(session.player_id);
                world.destroyed_this_tick[before..].to_vec()
            } else {
                Vec::new()
            };

            let room = self.rooms.get_room(session.room_id);
            let addrs = room.as_ref().map(|room| self.room_addrs(room)).unwrap_or_default();
            for id in destroyed_ids {
                let header = self.new_header(PacketType::EntityDestroy);
                out.push(Outbound::Multicast(addrs.clone(), protocol::encode(&Packet::EntityDestroy(header, id))));
            }
            if let Some(room) = room {
                out.push(self.room_update_outbound(&room));
            }
        }
        out
    }

    /// Current tracked session count, for health/metrics logging.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
