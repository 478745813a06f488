//! Per-room delta snapshot cache (§4.G).
//!
//! One [`SnapshotCache`] lives per room that has left `WAITING`. Every
//! snapshot tick, the dispatcher hands it the room's live entities and gets
//! back the `ENTITY_UPDATE` payload to broadcast — or `None` if nothing
//! changed and a full resend wasn't requested.

use std::collections::{HashMap, HashSet};

use crate::protocol::{EntityKind, EntityState, PlayerInputAck, SnapshotPayload};
use crate::simulation::ServerEntity;

/// Last-emitted [`EntityState`] per entity id, for one room.
///
/// Entities are already partitioned one [`crate::simulation::RoomWorld`] per
/// room, so "the live entity set visible to that room" (§4.G step 1) is
/// simply every entity in that world — there is no cross-room membership
/// filter to apply here.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    cache: HashMap<u32, EntityState>,
    next_seq: u32,
}

impl SnapshotCache {
    /// Creates an empty cache; the first snapshot built from it carries
    /// `snapshotSeq = 1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            next_seq: 1,
        }
    }

    /// Builds this tick's `ENTITY_UPDATE` payload, or `None` if there is
    /// nothing to send (§4.G step 6).
    ///
    /// `EXPLOSION` entities are never included — they are announced only via
    /// their `ENTITY_SPAWN` (§9, accepted as cosmetic). An entity previously
    /// in the cache but absent from `live_entities` this tick is dropped
    /// from the cache silently; its `ENTITY_DESTROY` is the dispatcher's
    /// responsibility, driven by [`crate::simulation::RoomWorld::destroyed_this_tick`].
    pub fn build_update<'a>(
        &mut self,
        live_entities: impl Iterator<Item = &'a ServerEntity>,
        acks: Vec<PlayerInputAck>,
        force_full: bool,
    ) -> Option<SnapshotPayload> {
        let mut seen = HashSet::new();
        let mut changed = Vec::new();

        for entity in live_entities {
            if entity.kind == EntityKind::Explosion {
                continue;
            }
            let wire = entity.to_wire();
            seen.insert(wire.id);

            let is_new_or_changed = match self.cache.get(&wire.id) {
                Some(cached) => wire.differs_from(cached),
                None => true,
            };
            if force_full || is_new_or_changed {
                changed.push(wire);
                self.cache.insert(wire.id, wire);
            }
        }

        self.cache.retain(|id, _| seen.contains(id));

        if changed.is_empty() && !force_full {
            return None;
        }

        let snapshot_seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1).max(1);
        Some(SnapshotPayload {
            snapshot_seq,
            acks,
            entities: changed,
        })
    }
}
