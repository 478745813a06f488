//! Authoritative entity simulation (§4.F).
//!
//! One [`RoomWorld`] exists per room that has left `WAITING`; it owns the
//! entity table, per-player score ledger, and the enemy spawner state that
//! drives it. Entities never cross rooms. The simulation thread is the sole
//! owner of every [`RoomWorld`] — the I/O thread never touches it.
//!
//! Per-entity-type rules, collision pairs, and the spawner follow §4.F
//! exactly; where the gameplay tuning record ([`GameplayConfig`]) is silent
//! on a detail (the monster's own per-shot jitter, the damage an enemy
//! missile deals to a player, a powerup's sub-kind), this module picks a
//! concrete rule and the choice is recorded in the repository's design
//! ledger rather than invented per call site.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::GameplayConfig;
use crate::protocol::EntityKind;

/// How far past the configured play boundary a non-player entity may drift
/// before it is queued for removal as out-of-bounds.
pub const OOB_MARGIN: f32 = 100.0;

/// How long a player's last-received input is still applied if no new
/// input arrives, smoothing over a dropped packet or two.
pub const INPUT_HOLD_SECS: f32 = 0.2;

/// Collision radius shared by every entity pair in the naive all-pairs pass.
pub const COLLISION_RADIUS: f32 = 24.0;

/// Lifetime, in seconds, of an `EXPLOSION` spawned by a missile/monster kill.
pub const EXPLOSION_LIFETIME: f32 = 0.5;

/// Lifetime of the smaller explosion spawned where a missile hits a player.
pub const HIT_EXPLOSION_LIFETIME: f32 = 0.3;

/// Boss archetype id, carried in `enemy_type`. The three ids 0..2 are
/// claimed by [`GameplayConfig::enemies`]'s grunt/fighter/kamikaze.
pub const BOSS_ENEMY_TYPE: u8 = 3;

/// Flat hit points for the boss archetype. Not present in [`BossConfig`]
/// (§3.1 lists only position, patrol, and damage fields for it), so the
/// simulation owns this constant directly.
///
/// [`BossConfig`]: crate::config::BossConfig
pub const BOSS_HP: u8 = 255;

/// Powerup sub-kind stored in the otherwise-unused `enemy_type` field of a
/// `POWERUP` entity: damages the boss on pickup.
pub const POWERUP_ORANGE: u8 = 0;
/// Powerup sub-kind: grants the player a temporary shield.
pub const POWERUP_BLUE: u8 = 1;

/// Seconds of simulated time before the boss spawner fires, once a room
/// enters `PLAYING`. Not named in [`GameplayConfig`] (§3.1's boss record has
/// no `spawnTime` field); kept as a simulation constant.
pub const BOSS_SPAWN_ELAPSED_SECS: f32 = 90.0;

/// One entity in the authoritative table. See spec §3 "ServerEntity".
#[derive(Clone, Copy, Debug)]
pub struct ServerEntity {
    /// Stable id for this entity's lifetime.
    pub id: u32,
    /// Discriminant; dictates which per-type rule applies each tick.
    pub kind: EntityKind,
    /// World position.
    pub x: f32,
    /// World position.
    pub y: f32,
    /// World velocity, units/second.
    pub vx: f32,
    /// World velocity, units/second.
    pub vy: f32,
    /// Hit points, 0..=255. Zero queues the entity for removal.
    pub hp: u8,
    /// Owning player id, or 0 for non-player-owned entities.
    pub owner_player_id: u8,
    /// Ship-color index, meaningful for `PLAYER` entities.
    pub player_line: u8,
    /// Seconds until this entity may next fire (`MONSTER`, `MODULE`) or the
    /// player may next fire (`PLAYER`, via a separate cooldown pair below).
    pub fire_timer: f32,
    /// Seconds remaining, or negative for "lives forever until some other
    /// rule removes it" (players, monsters, powerups, modules).
    pub lifetime: f32,
    /// Projectile charge level (1..=5), or [`crate::protocol::EntityState::SHIELD_SENTINEL`]
    /// marking an active player shield.
    pub charge_level: u8,
    /// Enemy archetype id (`MONSTER`) or powerup sub-kind (`POWERUP`).
    pub enemy_type: u8,
    /// Projectile archetype id, meaningful for missile entities.
    pub projectile_type: u8,
    /// Most recent `inputSeq` applied to this entity (`PLAYER` only).
    pub input_seq: u32,
    /// Last-received input mask, held for [`INPUT_HOLD_SECS`] past receipt.
    pub input_mask: u8,
    /// Seconds since `input_mask` was last refreshed by a `CLIENT_INPUT`.
    pub input_age: f32,
    /// Seconds remaining on an active shield (`PLAYER` only); clears
    /// [`Self::shielded`] on expiry.
    pub shield_timer: f32,
    /// True while a `PLAYER` has an active shield; reported on the wire as
    /// `charge_level == `[`crate::protocol::EntityState::SHIELD_SENTINEL`],
    /// kept out of the real `charge_level` field so a concurrent charged
    /// shot in progress isn't clobbered.
    pub shielded: bool,
    /// Player's normal-shot cooldown remaining.
    pub fire_cooldown_normal: f32,
    /// Player's charged-shot cooldown remaining.
    pub fire_cooldown_charged: f32,
    /// `y` this monster's zigzag/bob motion oscillates around.
    pub anchor_y: f32,
    /// Seconds elapsed, used as the phase for zigzag/bob/wave motion.
    pub age: f32,
}

impl ServerEntity {
    /// Builds a [`crate::protocol::EntityState`] wire record for this entity.
    #[must_use]
    pub fn to_wire(&self) -> crate::protocol::EntityState {
        crate::protocol::EntityState {
            id: self.id,
            kind: self.kind as u8,
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
            hp: self.hp,
            player_id: self.owner_player_id,
            player_line: self.player_line,
            charge_level: if self.shielded {
                crate::protocol::EntityState::SHIELD_SENTINEL
            } else {
                self.charge_level
            },
            enemy_type: self.enemy_type,
            projectile_type: self.projectile_type,
        }
    }
}

fn blank_entity(id: u32, kind: EntityKind) -> ServerEntity {
    ServerEntity {
        id,
        kind,
        x: 0.0,
        y: 0.0,
        vx: 0.0,
        vy: 0.0,
        hp: 1,
        owner_player_id: 0,
        player_line: 0,
        fire_timer: 0.0,
        lifetime: -1.0,
        charge_level: 0,
        enemy_type: 0,
        projectile_type: 0,
        input_seq: 0,
        input_mask: 0,
        input_age: 0.0,
        shield_timer: 0.0,
        shielded: false,
        fire_cooldown_normal: 0.0,
        fire_cooldown_charged: 0.0,
        anchor_y: 0.0,
        age: 0.0,
    }
}

/// One room's worth of live entities plus the spawner state that populates
/// them. Created when a room leaves `WAITING`; dropped with the room.
pub struct RoomWorld {
    entities: BTreeMap<u32, ServerEntity>,
    next_entity_id: u32,
    rng: ChaCha8Rng,
    scores: HashMap<u32, u64>,
    spawn_timer: f32,
    elapsed_secs: f32,
    boss_spawned: bool,
    next_archetype: u8,
    /// Entities destroyed this tick, reported so the dispatcher can emit
    /// `ENTITY_DESTROY`.
    pub destroyed_this_tick: Vec<u32>,
    /// Entities spawned this tick, reported so the dispatcher can emit
    /// `ENTITY_SPAWN`.
    pub spawned_this_tick: Vec<u32>,
}

impl RoomWorld {
    /// Creates an empty world with a deterministic PRNG seed.
    ///
    /// The same seed for the same room across two runs with the same input
    /// sequence yields bit-identical entity state (§8, "Tick determinism").
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            entities: BTreeMap::new(),
            next_entity_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
            scores: HashMap::new(),
            spawn_timer: 0.0,
            elapsed_secs: 0.0,
            boss_spawned: false,
            next_archetype: 0,
            destroyed_this_tick: Vec::new(),
            spawned_this_tick: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1).max(1);
        id
    }

    /// A value copy of one entity, if it exists.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<ServerEntity> {
        self.entities.get(&id).copied()
    }

    /// Every live entity, as wire records — the snapshot emitter's input.
    ///
    /// Iterates in ascending entity-id order (the table is a `BTreeMap`),
    /// so snapshot byte output is a deterministic function of state.
    pub fn live_entities(&self) -> impl Iterator<Item = &ServerEntity> {
        self.entities.values()
    }

    /// Total score credited to `player_id`.
    #[must_use]
    pub fn score(&self, player_id: u32) -> u64 {
        self.scores.get(&player_id).copied().unwrap_or(0)
    }

    /// Sum of every player's score, for `GAME_OVER`/`GAME_VICTORY`.
    #[must_use]
    pub fn total_score(&self) -> u64 {
        self.scores.values().sum()
    }

    /// Spawns one `PLAYER` entity at its deterministic join-order offset.
    pub fn spawn_player(&mut self, player_id: u32, player_line: u8, cfg: &GameplayConfig) -> u32 {
        let id = self.allocate_id();
        let join_index = self.entities.values().filter(|e| e.kind == EntityKind::Player).count();
        let mut entity = blank_entity(id, EntityKind::Player);
        entity.x = cfg.player.spawn_x;
        entity.y = cfg.player.spawn_y_start + (join_index as f32) * cfg.player.spawn_y_offset;
        entity.hp = cfg.player.max_health;
        entity.owner_player_id = u8::try_from(player_id).unwrap_or(u8::MAX);
        entity.player_line = player_line;
        self.entities.insert(id, entity);
        self.spawned_this_tick.push(id);
        id
    }

    fn spawn_monster(&mut self, archetype_id: u8, cfg: &GameplayConfig) {
        let enemies = &cfg.enemies;
        let archetype = match archetype_id {
            0 => &enemies.grunt,
            1 => &enemies.fighter,
            _ => &enemies.kamikaze,
        };
        let id = self.allocate_id();
        let mut entity = blank_entity(id, EntityKind::Monster);
        entity.x = enemies.spawn_x;
        entity.y = enemies.spawn_y_min + self.rng.gen::<f32>() * enemies.spawn_y_range;
        entity.anchor_y = entity.y;
        entity.vx = archetype.vx;
        entity.vy = archetype.vy;
        entity.hp = archetype.health;
        entity.enemy_type = archetype_id;
        entity.fire_timer = archetype.fire_rate;
        self.entities.insert(id, entity);
        self.spawned_this_tick.push(id);
    }

    fn spawn_boss(&mut self, cfg: &GameplayConfig) {
        let boss = &cfg.boss;
        let id = self.allocate_id();
        let mut entity = blank_entity(id, EntityKind::Monster);
        entity.x = boss.spawn_x;
        entity.y = boss.spawn_y;
        entity.anchor_y = boss.spawn_y;
        entity.hp = BOSS_HP;
        entity.enemy_type = BOSS_ENEMY_TYPE;
        self.entities.insert(id, entity);
        self.spawned_this_tick.push(id);
        self.boss_spawned = true;
    }

    fn spawn_player_missile(&mut self, owner: &ServerEntity, cfg: &GameplayConfig) {
        let p = &cfg.projectiles.player;
        let charged = owner.charge_level > 0;
        let id = self.allocate_id();
        let mut missile = blank_entity(id, EntityKind::PlayerMissile);
        missile.x = owner.x + p.spawn_offset_x;
        missile.y = owner.y + p.spawn_offset_y;
        missile.vx = if charged { p.charged_speed } else { p.normal_speed };
        missile.owner_player_id = owner.owner_player_id;
        missile.charge_level = owner.charge_level;
        missile.hp = 1;
        self.entities.insert(id, missile);
        self.spawned_this_tick.push(id);
    }

    fn spawn_monster_missile(&mut self, monster: &ServerEntity, cfg: &GameplayConfig) {
        let e = &cfg.projectiles.enemy;
        let archetype_speed = match monster.enemy_type {
            0 => cfg.enemies.grunt.vx,
            1 => cfg.enemies.fighter.vx,
            _ => cfg.enemies.kamikaze.vx,
        }
        .abs();
        let speed = (archetype_speed * e.speed_multiplier).max(e.min_speed);
        let id = self.allocate_id();
        let mut missile = blank_entity(id, EntityKind::MonsterMissile);
        missile.x = monster.x + e.spawn_offset_x;
        missile.y = monster.y;
        missile.vx = -speed;
        missile.hp = 1;
        self.entities.insert(id, missile);
        self.spawned_this_tick.push(id);
    }

    fn spawn_explosion(&mut self, x: f32, y: f32, lifetime: f32) {
        let id = self.allocate_id();
        let mut explosion = blank_entity(id, EntityKind::Explosion);
        explosion.x = x;
        explosion.y = y;
        explosion.lifetime = lifetime;
        explosion.hp = 1;
        self.entities.insert(id, explosion);
        self.spawned_this_tick.push(id);
    }

    /// Records a freshly received input for a live `PLAYER` entity owned by
    /// `player_id`. A stale `inputSeq` (≤ what was already applied) is
    /// ignored, matching the idempotency property in §8.
    pub fn apply_input(&mut self, player_id: u8, input_mask: u8, charge_level: u8, input_seq: u32) {
        if let Some(player) = self
            .entities
            .values_mut()
            .find(|e| e.kind == EntityKind::Player && e.owner_player_id == player_id)
        {
            if input_seq <= player.input_seq && player.input_seq != 0 {
                return;
            }
            player.input_seq = input_seq;
            player.input_mask = input_mask;
            player.input_age = 0.0;
            player.charge_level = charge_level;
        }
    }

    /// The most recent `inputSeq` applied for `player_id`, for the snapshot
    /// emitter's per-player ack.
    #[must_use]
    pub fn last_processed_input_seq(&self, player_id: u8) -> u32 {
        self.entities
            .values()
            .find(|e| e.kind == EntityKind::Player && e.owner_player_id == player_id)
            .map_or(0, |e| e.input_seq)
    }

    /// Advances the world by one fixed step `dt` (§4.F steps 2-6). Dispatch
    /// of step 1 (draining the receive queue) happens in the caller before
    /// this is called.
    pub fn tick(&mut self, dt: f32, cfg: &GameplayConfig, any_room_playing: bool) {
        self.destroyed_this_tick.clear();
        self.spawned_this_tick.clear();
        self.elapsed_secs += dt;

        self.integrate_and_age(dt);
        self.apply_type_rules(dt, cfg);
        self.run_collisions(cfg);
        self.remove_queued();
        if any_room_playing {
            self.advance_spawner(dt, cfg);
        }
    }

    fn integrate_and_age(&mut self, dt: f32) {
        let mut expired = Vec::new();
        for entity in self.entities.values_mut() {
            entity.age += dt;
            if entity.lifetime >= 0.0 {
                entity.lifetime -= dt;
                if entity.lifetime <= 0.0 {
                    expired.push(entity.id);
                    continue;
                }
            }
            entity.x += entity.vx * dt;
            entity.y += entity.vy * dt;
            entity.fire_timer -= dt;
            entity.input_age += dt;
            if entity.shielded {
                entity.shield_timer -= dt;
                if entity.shield_timer <= 0.0 {
                    entity.shielded = false;
                }
            }
        }
        for id in expired {
            self.queue_removal(id);
        }
    }

    fn apply_type_rules(&mut self, dt: f32, cfg: &GameplayConfig) {
        let player_cfg = cfg.player;
        let mut to_spawn_missiles = Vec::new();
        let mut to_spawn_monster_missiles = Vec::new();
        let mut to_remove = Vec::new();

        for entity in self.entities.values_mut() {
            match entity.kind {
                EntityKind::Player => {
                    entity.x = entity.x.clamp(player_cfg.boundary_min_x, player_cfg.boundary_max_x);
                    entity.y = entity.y.clamp(player_cfg.boundary_min_y, player_cfg.boundary_max_y);
                    entity.fire_cooldown_normal -= dt;
                    entity.fire_cooldown_charged -= dt;

                    let mask = if entity.input_age <= INPUT_HOLD_SECS { entity.input_mask } else { 0 };
                    let mut vx = 0.0;
                    let mut vy = 0.0;
                    if mask & crate::protocol::ClientInputPayload::LEFT != 0 {
                        vx -= player_cfg.speed;
                    }
                    if mask & crate::protocol::ClientInputPayload::RIGHT != 0 {
                        vx += player_cfg.speed;
                    }
                    if mask & crate::protocol::ClientInputPayload::UP != 0 {
                        vy -= player_cfg.speed;
                    }
                    if mask & crate::protocol::ClientInputPayload::DOWN != 0 {
                        vy += player_cfg.speed;
                    }
                    entity.vx = vx;
                    entity.vy = vy;

                    let charged = entity.charge_level > 0;
                    let firing = mask & crate::protocol::ClientInputPayload::FIRE != 0;
                    let cooldown_ready = if charged { entity.fire_cooldown_charged <= 0.0 } else { entity.fire_cooldown_normal <= 0.0 };
                    if firing && cooldown_ready {
                        if charged {
                            entity.fire_cooldown_charged = cfg.projectiles.player.fire_cooldown_charged;
                        } else {
                            entity.fire_cooldown_normal = cfg.projectiles.player.fire_cooldown_normal;
                        }
                        to_spawn_missiles.push(*entity);
                    }
                }
                EntityKind::PlayerMissile => {
                    if is_out_of_bounds(entity.x, entity.y, &player_cfg) {
                        to_remove.push(entity.id);
                    }
                }
                EntityKind::Monster => {
                    if entity.enemy_type == BOSS_ENEMY_TYPE {
                        let boss = &cfg.boss;
                        entity.x += (boss.stop_x - entity.x).clamp(-200.0 * dt, 200.0 * dt);
                        entity.y = entity.anchor_y + (entity.age * boss.bob_speed).sin() * boss.bob_amplitude;
                        entity.vy = 0.0;
                    } else {
                        let archetype = match entity.enemy_type {
                            0 => &cfg.enemies.grunt,
                            1 => &cfg.enemies.fighter,
                            _ => &cfg.enemies.kamikaze,
                        };
                        if archetype.zigzag_interval > 0.0 {
                            let span = (archetype.boundary_bottom - archetype.boundary_top).max(1.0);
                            let phase = (entity.age / archetype.zigzag_interval) * std::f32::consts::TAU;
                            entity.y = (entity.anchor_y + phase.sin() * span * 0.5)
                                .clamp(archetype.boundary_top, archetype.boundary_bottom);
                        }
                        if on_screen(entity.x, &player_cfg) && entity.fire_timer <= 0.0 && archetype.fire_rate > 0.0 {
                            to_spawn_monster_missiles.push(*entity);
                            entity.fire_timer = archetype.fire_rate;
                        }
                        if is_out_of_bounds(entity.x, entity.y, &player_cfg) {
                            to_remove.push(entity.id);
                        }
                    }
                }
                EntityKind::MonsterMissile => {
                    if is_out_of_bounds(entity.x, entity.y, &player_cfg) {
                        to_remove.push(entity.id);
                    }
                }
                EntityKind::Explosion | EntityKind::Powerup | EntityKind::Module => {}
            }
        }

        for owner in to_spawn_missiles {
            self.spawn_player_missile(&owner, cfg);
        }
        for monster in to_spawn_monster_missiles {
            self.spawn_monster_missile(&monster, cfg);
        }
        for id in to_remove {
            self.queue_removal(id);
        }
    }

    fn run_collisions(&mut self, cfg: &GameplayConfig) {
        // Ascending entity-id order (from the `BTreeMap`): when two missiles
        // hit the same monster in one pass, which one's `last_damager` entry
        // wins is then a deterministic function of id, not iteration order.
        let ids: Vec<u32> = self.entities.keys().copied().collect();
        let mut removals = Vec::new();
        let mut explosions = Vec::new();
        let mut shield_grants: Vec<u32> = Vec::new();
        let mut hp_deltas: HashMap<u32, i32> = HashMap::new();
        // Monster id -> player id whose missile last damaged it this pass,
        // so a kill can be credited to its actual shooter.
        let mut last_damager: HashMap<u32, u8> = HashMap::new();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (Some(a), Some(b)) = (self.entities.get(&ids[i]), self.entities.get(&ids[j])) else { continue };
                if !within_collision_radius(a, b) {
                    continue;
                }
                let (missile, monster) = match (a.kind, b.kind) {
                    (EntityKind::PlayerMissile, EntityKind::Monster) => (Some(a), Some(b)),
                    (EntityKind::Monster, EntityKind::PlayerMissile) => (Some(b), Some(a)),
                    _ => (None, None),
                };
                if let (Some(missile), Some(monster)) = (missile, monster) {
                    let damage = missile_damage(missile, cfg);
                    *hp_deltas.entry(monster.id).or_insert(0) -= i32::from(damage);
                    last_damager.insert(monster.id, missile.owner_player_id);
                    removals.push(missile.id);
                    continue;
                }

                let (missile, player) = match (a.kind, b.kind) {
                    (EntityKind::MonsterMissile, EntityKind::Player) => (Some(a), Some(b)),
                    (EntityKind::Player, EntityKind::MonsterMissile) => (Some(b), Some(a)),
                    _ => (None, None),
                };
                if let (Some(missile), Some(player)) = (missile, player) {
                    if player.shielded {
                        removals.push(missile.id);
                        continue;
                    }
                    *hp_deltas.entry(player.id).or_insert(0) -= i32::from(cfg.projectiles.missile_damage);
                    removals.push(missile.id);
                    explosions.push((player.x, player.y, HIT_EXPLOSION_LIFETIME));
                    continue;
                }

                let (monster, player) = match (a.kind, b.kind) {
                    (EntityKind::Monster, EntityKind::Player) => (Some(a), Some(b)),
                    (EntityKind::Player, EntityKind::Monster) => (Some(b), Some(a)),
                    _ => (None, None),
                };
                if let (Some(monster), Some(player)) = (monster, player) {
                    if player.shielded {
                        continue;
                    }
                    if monster.enemy_type == BOSS_ENEMY_TYPE {
                        let boss = &cfg.boss;
                        *hp_deltas.entry(player.id).or_insert(0) -= i32::from(boss.collision_damage_to_player);
                        *hp_deltas.entry(monster.id).or_insert(0) -= i32::from(boss.collision_damage_from_player);
                    } else {
                        let archetype = match monster.enemy_type {
                            0 => &cfg.enemies.grunt,
                            1 => &cfg.enemies.fighter,
                            _ => &cfg.enemies.kamikaze,
                        };
                        *hp_deltas.entry(player.id).or_insert(0) -= i32::from(archetype.collision_damage);
                        removals.push(monster.id);
                    }
                    explosions.push((player.x, player.y, HIT_EXPLOSION_LIFETIME));
                    continue;
                }

                let (powerup, player) = match (a.kind, b.kind) {
                    (EntityKind::Powerup, EntityKind::Player) => (Some(a), Some(b)),
                    (EntityKind::Player, EntityKind::Powerup) => (Some(b), Some(a)),
                    _ => (None, None),
                };
                if let (Some(powerup), Some(player)) = (powerup, player) {
                    removals.push(powerup.id);
                    match powerup.enemy_type {
                        POWERUP_BLUE => shield_grants.push(player.id),
                        _ => {
                            let boss_damage = (f32::from(BOSS_HP) * cfg.powerups.orange.boss_damage_fraction) as i32;
                            if let Some(boss) = self.entities.values().find(|e| e.enemy_type == BOSS_ENEMY_TYPE) {
                                *hp_deltas.entry(boss.id).or_insert(0) -= boss_damage;
                            }
                        }
                    }
                }
            }
        }

        for (&id, &delta) in &hp_deltas {
            let Some(entity) = self.entities.get(&id) else { continue };
            if entity.kind == EntityKind::Monster && i32::from(entity.hp) + delta <= 0 {
                let score = if entity.enemy_type == BOSS_ENEMY_TYPE {
                    cfg.boss.score
                } else {
                    match entity.enemy_type {
                        0 => cfg.enemies.grunt.score,
                        1 => cfg.enemies.fighter.score,
                        _ => cfg.enemies.kamikaze.score,
                    }
                };
                if let Some(&shooter) = last_damager.get(&id) {
                    *self.scores.entry(u32::from(shooter)).or_insert(0) += u64::from(score);
                }
                explosions.push((entity.x, entity.y, EXPLOSION_LIFETIME));
            }
        }
        for (id, delta) in hp_deltas {
            if let Some(entity) = self.entities.get_mut(&id) {
                let new_hp = (i32::from(entity.hp) + delta).max(0);
                entity.hp = u8::try_from(new_hp).unwrap_or(0);
                if entity.hp == 0 {
                    removals.push(id);
                }
            }
        }

        for id in shield_grants {
            if let Some(player) = self.entities.get_mut(&id) {
                player.shielded = true;
                player.shield_timer = cfg.powerups.blue.duration;
            }
        }
        for (x, y, lifetime) in explosions {
            self.spawn_explosion(x, y, lifetime);
        }
        for id in removals {
            self.queue_removal(id);
        }
    }

    fn advance_spawner(&mut self, dt: f32, cfg: &GameplayConfig) {
        if !self.boss_spawned && self.elapsed_secs >= BOSS_SPAWN_ELAPSED_SECS {
            self.spawn_boss(cfg);
            return;
        }
        if self.boss_spawned {
            return;
        }
        self.spawn_timer -= dt;
        if self.spawn_timer <= 0.0 {
            self.spawn_monster(self.next_archetype, cfg);
            self.next_archetype = (self.next_archetype + 1) % 3;
            self.spawn_timer = cfg.enemies.fire_timer_base + self.rng.gen::<f32>() * cfg.enemies.fire_timer_random_range;
        }
    }

    fn queue_removal(&mut self, id: u32) {
        if self.entities.remove(&id).is_some() {
            self.destroyed_this_tick.push(id);
        }
    }

    fn remove_queued(&mut self) {
        // Removal itself happens eagerly in `queue_removal`; this is the
        // documented seam (§4.F step 5) where a slower implementation would
        // batch instead.
    }

    /// Credits `amount` to `player_id`'s score directly (used by the
    /// dispatcher for out-of-band awards; the collision pass credits kills
    /// internally).
    pub fn credit_score(&mut self, player_id: u32, amount: u64) {
        *self.scores.entry(player_id).or_insert(0) += amount;
    }

    /// Removes every entity owned by `player_id` (a departing player).
    pub fn remove_player_entities(&mut self, player_id: u8) {
        let ids: Vec<u32> = self
            .entities
            .values()
            .filter(|e| e.kind == EntityKind::Player && e.owner_player_id == player_id)
            .map(|e| e.id)
            .collect();
        for id in ids {
            self.queue_removal(id);
        }
    }

    /// True once the boss has been spawned and then destroyed.
    #[must_use]
    pub fn boss_defeated(&self) -> bool {
        self.boss_spawned && !self.entities.values().any(|e| e.enemy_type == BOSS_ENEMY_TYPE)
    }
}

fn on_screen(x: f32, player_cfg: &crate::config::PlayerConfig) -> bool {
    x >= player_cfg.boundary_min_x && x <= player_cfg.boundary_max_x
}

fn is_out_of_bounds(x: f32, y: f32, player_cfg: &crate::config::PlayerConfig) -> bool {
    x < player_cfg.boundary_min_x - OOB_MARGIN
        || x > player_cfg.boundary_max_x + OOB_MARGIN
        || y < player_cfg.boundary_min_y - OOB_MARGIN
        || y > player_cfg.boundary_max_y + OOB_MARGIN
}

fn within_collision_radius(a: &ServerEntity, b: &ServerEntity) -> bool {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy <= COLLISION_RADIUS * COLLISION_RADIUS
}

fn missile_damage(missile: &ServerEntity, cfg: &GameplayConfig) -> u8 {
    let p = &cfg.projectiles.player;
    if missile.charge_level > 0 {
        ((f32::from(p.base_damage)) * p.charge_damage_multiplier) as u8
    } else {
        p.base_damage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> GameplayConfig {
        GameplayConfig::default()
    }

    #[test]
    fn player_moves_right_while_held_and_clamps_to_boundary() {
        let mut world = RoomWorld::new(1);
        let cfg = cfg();
        let id = world.spawn_player(1, 0, &cfg);
        world.apply_input(1, crate::protocol::ClientInputPayload::RIGHT, 0, 1);
        for _ in 0..10 {
            world.tick(1.0 / 60.0, &cfg, true);
        }
        let player = world.get(id).unwrap();
        assert!(player.x > cfg.player.spawn_x);
    }

    #[test]
    fn stale_input_sequence_is_ignored() {
        let mut world = RoomWorld::new(1);
        let cfg = cfg();
        world.spawn_player(1, 0, &cfg);
        world.apply_input(1, crate::protocol::ClientInputPayload::RIGHT, 0, 5);
        world.apply_input(1, 0, 0, 3);
        assert_eq!(world.last_processed_input_seq(1), 5);
    }

    #[test]
    fn input_hold_window_keeps_moving_briefly_after_last_packet() {
        let mut world = RoomWorld::new(1);
        let cfg = cfg();
        let id = world.spawn_player(1, 0, &cfg);
        world.apply_input(1, crate::protocol::ClientInputPayload::RIGHT, 0, 1);
        world.tick(0.05, &cfg, true);
        let moved_once = world.get(id).unwrap().x;
        world.tick(0.05, &cfg, true);
        assert!(world.get(id).unwrap().x > moved_once);
    }

    #[test]
    fn player_missile_collides_with_monster_and_both_are_removed() {
        let mut world = RoomWorld::new(7);
        let cfg = cfg();
        world.spawn_player(1, 0, &cfg);
        world.spawn_player_missile_for_test(100.0, 100.0, 800.0, 1, &cfg);
        world.spawn_monster_for_test(110.0, 100.0, &cfg);
        world.tick(1.0 / 60.0, &cfg, true);
        let missile_remaining = world.live_entities().filter(|e| e.kind == EntityKind::PlayerMissile).count();
        assert_eq!(missile_remaining, 0);
    }

    #[test]
    fn out_of_bounds_missile_is_removed() {
        let mut world = RoomWorld::new(1);
        let cfg = cfg();
        world.spawn_player_missile_for_test(cfg.player.boundary_max_x + OOB_MARGIN + 1.0, 0.0, 0.0, 1, &cfg);
        world.tick(1.0 / 60.0, &cfg, true);
        assert_eq!(world.live_entities().count(), 0);
    }
}

#[cfg(test)]
impl RoomWorld {
    fn spawn_player_missile_for_test(&mut self, x: f32, y: f32, vx: f32, owner: u8, _cfg: &GameplayConfig) {
        let id = self.allocate_id();
        let mut missile = blank_entity(id, EntityKind::PlayerMissile);
        missile.x = x;
        missile.y = y;
        missile.vx = vx;
        missile.owner_player_id = owner;
        self.entities.insert(id, missile);
    }

    fn spawn_monster_for_test(&mut self, x: f32, y: f32, cfg: &GameplayConfig) {
        let id = self.allocate_id();
        let mut monster = blank_entity(id, EntityKind::Monster);
        monster.x = x;
        monster.y = y;
        monster.hp = cfg.enemies.grunt.health;
        self.entities.insert(id, monster);
    }
}
