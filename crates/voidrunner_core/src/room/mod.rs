//! Rooms and the lobby state machine.
//!
//! A [`Room`] tracks membership, ready state, and host ownership for one
//! lobby/match. [`RoomManager`] owns every room behind a single lock —
//! rooms are never handed out by reference, only as value copies, so a
//! caller can never observe a room mid-mutation by another thread.

use std::collections::HashMap;

use parking_lot::Mutex;

/// A room's place in the match lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomState {
    /// Accepting joins; not yet started.
    Waiting,
    /// Match in progress.
    Playing,
    /// Match paused by the host.
    Paused,
}

/// One lobby/match, with membership and ready state.
#[derive(Clone, Debug)]
pub struct Room {
    /// Monotonically allocated room id.
    pub id: u32,
    /// Display name, settable by the host via `renameRoom`.
    pub name: String,
    /// Members in join order; join order doubles as ship-color assignment.
    pub player_ids: Vec<u32>,
    /// Ready flag per member.
    ready: HashMap<u32, bool>,
    /// Current lifecycle state.
    pub state: RoomState,
    /// Configured capacity, 1..=8.
    pub max_players: u8,
    /// The current host's player id. Always a current member while the
    /// room has any members.
    pub host_player_id: u32,
}

impl Room {
    fn new(id: u32, name: String, max_players: u8, host_player_id: u32) -> Self {
        Self {
            id,
            name,
            player_ids: Vec::new(),
            ready: HashMap::new(),
            state: RoomState::Waiting,
            max_players,
            host_player_id,
        }
    }

    /// True once every current member (and there is at least one) is ready.
    #[must_use]
    pub fn all_ready(&self) -> bool {
        !self.player_ids.is_empty() && self.player_ids.iter().all(|id| self.is_ready(*id))
    }

    /// Whether `player_id` has toggled ready; false for non-members.
    #[must_use]
    pub fn is_ready(&self, player_id: u32) -> bool {
        self.ready.get(&player_id).copied().unwrap_or(false)
    }

    /// Whether `player_id` is a current member.
    #[must_use]
    pub fn has_player(&self, player_id: u32) -> bool {
        self.player_ids.contains(&player_id)
    }

    fn add_player(&mut self, player_id: u32) -> bool {
        if self.has_player(player_id) {
            return true;
        }
        if self.player_ids.len() >= self.max_players as usize || self.state != RoomState::Waiting {
            return false;
        }
        self.player_ids.push(player_id);
        self.ready.insert(player_id, false);
        true
    }

    fn remove_player(&mut self, player_id: u32) {
        self.player_ids.retain(|&id| id != player_id);
        self.ready.remove(&player_id);
        if self.host_player_id == player_id {
            if let Some(&earliest) = self.player_ids.first() {
                self.host_player_id = earliest;
            }
        }
    }
}

/// Owns every [`Room`] behind one lock.
///
/// Rooms are exposed only as value copies (`Room` derives `Clone`); the
/// guard is never released while a caller still holds a borrowed `&Room`.
pub struct RoomManager {
    rooms: Mutex<HashMap<u32, Room>>,
    next_room_id: Mutex<u32>,
}

impl RoomManager {
    /// Creates an empty manager; room ids are allocated starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            next_room_id: Mutex::new(1),
        }
    }

    /// Allocates and inserts a new, empty room. The host is not an
    /// automatic member; the caller performs a subsequent [`Self::join_room`].
    pub fn create_room(&self, name: &str, max_players: u8, host_player_id: u32) -> u32 {
        let mut next_id = self.next_room_id.lock();
        let id = *next_id;
        *next_id += 1;
        drop(next_id);

        let room = Room::new(id, name.to_string(), max_players, host_player_id);
        self.rooms.lock().insert(id, room);
        tracing::info!(room_id = id, name, "room created");
        id
    }

    /// Renames a room. Succeeds only if `player_id` is the current host.
    #[must_use]
    pub fn rename_room(&self, room_id: u32, player_id: u32, new_name: &str) -> bool {
        let mut rooms = self.rooms.lock();
        match rooms.get_mut(&room_id) {
            Some(room) if room.host_player_id == player_id => {
                room.name = new_name.to_string();
                true
            }
            _ => false,
        }
    }

    /// Joins `player_id` to `room_id`.
    ///
    /// Fails if the room doesn't exist, is full, or has left `WAITING`.
    /// Joining a room the player is already in is a harmless no-op that
    /// returns `true`.
    #[must_use]
    pub fn join_room(&self, room_id: u32, player_id: u32) -> bool {
        let mut rooms = self.rooms.lock();
        match rooms.get_mut(&room_id) {
            Some(room) => room.add_player(player_id),
            None => false,
        }
    }

    /// Removes `player_id` from `room_id`.
    ///
    /// If the room becomes empty it is destroyed immediately. If the
    /// leaver was host and members remain, host passes to the earliest
    /// joined remaining member.
    pub fn leave_room(&self, room_id: u32, player_id: u32) {
        let mut rooms = self.rooms.lock();
        let Some(room) = rooms.get_mut(&room_id) else { return };
        room.remove_player(player_id);
        if room.player_ids.is_empty() {
            rooms.remove(&room_id);
            tracing::info!(room_id, "room closed (empty)");
        }
    }

    /// Sets `player_id`'s ready flag in `room_id`. Fails for non-members.
    #[must_use]
    pub fn set_ready(&self, room_id: u32, player_id: u32, ready: bool) -> bool {
        let mut rooms = self.rooms.lock();
        match rooms.get_mut(&room_id) {
            Some(room) if room.has_player(player_id) => {
                room.ready.insert(player_id, ready);
                true
            }
            _ => false,
        }
    }

    /// True iff `room_id` exists, has at least one member, and every
    /// member is ready.
    #[must_use]
    pub fn all_ready(&self, room_id: u32) -> bool {
        self.rooms
            .lock()
            .get(&room_id)
            .is_some_and(Room::all_ready)
    }

    /// A value copy of one room, safe to use outside the lock.
    #[must_use]
    pub fn get_room(&self, room_id: u32) -> Option<Room> {
        self.rooms.lock().get(&room_id).cloned()
    }

    /// Transitions a room from `WAITING` to `PLAYING`, if currently waiting.
    #[must_use]
    pub fn start_game(&self, room_id: u32) -> bool {
        let mut rooms = self.rooms.lock();
        match rooms.get_mut(&room_id) {
            Some(room) if room.state == RoomState::Waiting => {
                room.state = RoomState::Playing;
                true
            }
            _ => false,
        }
    }

    /// Toggles a room between `PLAYING` and `PAUSED`.
    ///
    /// Fails if the room doesn't exist, `player_id` isn't its host, or the
    /// room is `WAITING` (nothing to pause yet). Returns the room's state
    /// after the toggle.
    pub fn toggle_pause(&self, room_id: u32, player_id: u32) -> Option<RoomState> {
        let mut rooms = self.rooms.lock();
        let room = rooms.get_mut(&room_id)?;
        if room.host_player_id != player_id {
            return None;
        }
        room.state = match room.state {
            RoomState::Playing => RoomState::Paused,
            RoomState::Paused => RoomState::Playing,
            RoomState::Waiting => return None,
        };
        Some(room.state)
    }

    /// A value-copy snapshot of every room, safe to use outside the lock.
    #[must_use]
    pub fn list_rooms(&self) -> Vec<Room> {
        self.rooms.lock().values().cloned().collect()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
