//! Configuration surface.
//!
//! [`CoreConfig`] is the process-level record loaded by the binary crate
//! from a TOML file (§6.1). [`GameplayConfig`] is the gameplay tuning
//! record (§3.1) — the shape the scripting layer this core treats as an
//! external collaborator hands in. Neither struct is ever read from disk
//! by this crate itself; `core_server` owns that and passes both in by
//! value.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Process-level configuration: tick rate, networking, and lobby gating.
///
/// `Default` matches the literal defaults named throughout the simulation
/// and snapshot specification.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Snapshots emitted per second (always ≤ `tick_rate`).
    pub snapshot_rate: u32,
    /// UDP port the server binds.
    pub port: u16,
    /// Minimum members required before `GAME_START` is honored.
    pub min_players_to_start: u8,
    /// Hard cap on simultaneous player ships in one room.
    pub max_player_ships: u8,
    /// Seconds of silence before a session is reaped.
    pub session_timeout_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            snapshot_rate: 30,
            port: 7777,
            min_players_to_start: 1,
            max_player_ships: 8,
            session_timeout_secs: 5,
        }
    }
}

impl CoreConfig {
    /// Parses a [`CoreConfig`] from TOML source, then validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, or
    /// [`ConfigError::OutOfRange`] if a validated field is outside its
    /// documented range.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks fields with a documented range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=8).contains(&self.max_player_ships) {
            return Err(ConfigError::OutOfRange { field: "max_player_ships" });
        }
        if self.min_players_to_start == 0 || self.min_players_to_start > self.max_player_ships {
            return Err(ConfigError::OutOfRange { field: "min_players_to_start" });
        }
        if self.tick_rate == 0 || self.snapshot_rate == 0 || self.snapshot_rate > self.tick_rate {
            return Err(ConfigError::OutOfRange { field: "snapshot_rate" });
        }
        Ok(())
    }
}

/// Player movement and spawn tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Units per second.
    pub speed: f32,
    /// Starting/maximum hit points.
    pub max_health: u8,
    /// Fixed spawn X for every player.
    pub spawn_x: f32,
    /// Spawn Y of the first joined player.
    pub spawn_y_start: f32,
    /// Added to `spawn_y_start` per join index.
    pub spawn_y_offset: f32,
    /// Movement clamp, min X.
    pub boundary_min_x: f32,
    /// Movement clamp, min Y.
    pub boundary_min_y: f32,
    /// Movement clamp, max X.
    pub boundary_max_x: f32,
    /// Movement clamp, max Y.
    pub boundary_max_y: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            speed: 500.0,
            max_health: 100,
            spawn_x: 200.0,
            spawn_y_start: 300.0,
            spawn_y_offset: 80.0,
            boundary_min_x: 0.0,
            boundary_min_y: 0.0,
            boundary_max_x: 1920.0,
            boundary_max_y: 1080.0,
        }
    }
}

/// Tuning shared by one enemy archetype (grunt, fighter, kamikaze, ...).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyArchetypeConfig {
    /// The archetype's id, carried as `EntityState::enemy_type`.
    pub type_id: u8,
    /// Starting hit points.
    pub health: u8,
    /// Base horizontal velocity.
    pub vx: f32,
    /// Base vertical velocity.
    pub vy: f32,
    /// Which fire pattern this archetype uses.
    pub fire_pattern: u8,
    /// Seconds between shots.
    pub fire_rate: f32,
    /// Damage dealt to a player on body contact.
    pub collision_damage: u8,
    /// Score awarded for a kill.
    pub score: u32,
    /// Period of the weaving (zigzag) movement.
    pub zigzag_interval: f32,
    /// Vertical patrol boundary, top.
    pub boundary_top: f32,
    /// Vertical patrol boundary, bottom.
    pub boundary_bottom: f32,
    /// Homing turn speed, meaningful for tracking archetypes.
    pub tracking_speed: f32,
}

impl Default for EnemyArchetypeConfig {
    fn default() -> Self {
        Self {
            type_id: 0,
            health: 10,
            vx: -100.0,
            vy: 0.0,
            fire_pattern: 0,
            fire_rate: 1.5,
            collision_damage: 10,
            score: 100,
            zigzag_interval: 1.0,
            boundary_top: 50.0,
            boundary_bottom: 1030.0,
            tracking_speed: 0.0,
        }
    }
}

/// The three enemy archetypes plus the spawner that places them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    /// Slow, straight-line shooter.
    pub grunt: EnemyArchetypeConfig,
    /// Faster, weaving shooter.
    pub fighter: EnemyArchetypeConfig,
    /// No fire pattern; damages on contact and dies on impact.
    pub kamikaze: EnemyArchetypeConfig,
    /// Fixed spawn X.
    pub spawn_x: f32,
    /// Minimum spawn Y.
    pub spawn_y_min: f32,
    /// Added to `spawn_y_min`, scaled by a uniform `[0,1)` draw.
    pub spawn_y_range: f32,
    /// Base seconds between spawner fire-timer resets.
    pub fire_timer_base: f32,
    /// Extra random jitter added to `fire_timer_base` each reset.
    pub fire_timer_random_range: f32,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self {
            grunt: EnemyArchetypeConfig { type_id: 0, ..EnemyArchetypeConfig::default() },
            fighter: EnemyArchetypeConfig { type_id: 1, vx: -160.0, fire_rate: 0.9, health: 18, score: 200, ..EnemyArchetypeConfig::default() },
            kamikaze: EnemyArchetypeConfig { type_id: 2, vx: -220.0, health: 6, score: 150, collision_damage: 25, ..EnemyArchetypeConfig::default() },
            spawn_x: 1920.0,
            spawn_y_min: 50.0,
            spawn_y_range: 980.0,
            fire_timer_base: 2.0,
            fire_timer_random_range: 1.5,
        }
    }
}

/// Boss encounter tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossConfig {
    /// Spawn position X.
    pub spawn_x: f32,
    /// Spawn position Y.
    pub spawn_y: f32,
    /// X the boss settles at after entering.
    pub stop_x: f32,
    /// Vertical bob speed.
    pub bob_speed: f32,
    /// Vertical bob amplitude.
    pub bob_amplitude: f32,
    /// Vertical patrol boundary, top.
    pub boundary_top: f32,
    /// Vertical patrol boundary, bottom.
    pub boundary_bottom: f32,
    /// Score awarded on defeat.
    pub score: u32,
    /// Damage dealt to a player on body contact.
    pub collision_damage_to_player: u8,
    /// Damage the boss takes from player body contact.
    pub collision_damage_from_player: u8,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            spawn_x: 2000.0,
            spawn_y: 540.0,
            stop_x: 1600.0,
            bob_speed: 1.0,
            bob_amplitude: 120.0,
            boundary_top: 100.0,
            boundary_bottom: 980.0,
            score: 5000,
            collision_damage_to_player: 40,
            collision_damage_from_player: 5,
        }
    }
}

/// Player-fired projectile tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerProjectileConfig {
    /// Speed of an uncharged shot.
    pub normal_speed: f32,
    /// Speed of a fully charged shot.
    pub charged_speed: f32,
    /// Damage of an uncharged shot.
    pub base_damage: u8,
    /// Multiplies `base_damage` at full charge.
    pub charge_damage_multiplier: f32,
    /// Seconds between uncharged shots.
    pub fire_cooldown_normal: f32,
    /// Seconds between charged shots.
    pub fire_cooldown_charged: f32,
    /// Muzzle offset from the ship, X.
    pub spawn_offset_x: f32,
    /// Muzzle offset from the ship, Y.
    pub spawn_offset_y: f32,
}

impl Default for PlayerProjectileConfig {
    fn default() -> Self {
        Self {
            normal_speed: 800.0,
            charged_speed: 1100.0,
            base_damage: 10,
            charge_damage_multiplier: 3.0,
            fire_cooldown_normal: 0.25,
            fire_cooldown_charged: 0.8,
            spawn_offset_x: 40.0,
            spawn_offset_y: 0.0,
        }
    }
}

/// Enemy-fired projectile tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyProjectileConfig {
    /// Multiplies the firing enemy's base speed.
    pub speed_multiplier: f32,
    /// Floor applied after the multiplier.
    pub min_speed: f32,
    /// Shots fired in a circular pattern.
    pub circle_count: u8,
    /// Speed scale applied to circular-pattern shots.
    pub circle_speed_factor: f32,
    /// Total fan angle of a spread pattern, radians.
    pub spread_angle: f32,
    /// Muzzle offset from the enemy, X.
    pub spawn_offset_x: f32,
}

impl Default for EnemyProjectileConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            min_speed: 150.0,
            circle_count: 8,
            circle_speed_factor: 0.6,
            spread_angle: std::f32::consts::FRAC_PI_3,
            spawn_offset_x: -20.0,
        }
    }
}

/// Both projectile tuning tables plus damage a stray missile deals on
/// collision with an entity it wasn't aimed at.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    /// Player-fired shots.
    pub player: PlayerProjectileConfig,
    /// Enemy-fired shots.
    pub enemy: EnemyProjectileConfig,
    /// Flat damage for a missile/missile collision.
    pub missile_damage: u8,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            player: PlayerProjectileConfig::default(),
            enemy: EnemyProjectileConfig::default(),
            missile_damage: 5,
        }
    }
}

/// Homing-module tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingModuleConfig {
    /// Projectile travel speed.
    pub speed: f32,
    /// Radius within which a target is acquired.
    pub detection_radius: f32,
    /// Radians/second the projectile may turn toward its target.
    pub turn_rate: f32,
    /// Which projectile archetype this module fires.
    pub projectile_type: u8,
}

impl Default for HomingModuleConfig {
    fn default() -> Self {
        Self { speed: 600.0, detection_radius: 500.0, turn_rate: 3.0, projectile_type: 0 }
    }
}

/// Spread-module tuning: one shot per entry in `angles`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadModuleConfig {
    /// Which projectile archetype this module fires.
    pub projectile_type: u8,
    /// Fan angles (radians, relative to forward) fired simultaneously.
    pub angles: Vec<f32>,
}

impl Default for SpreadModuleConfig {
    fn default() -> Self {
        Self { projectile_type: 1, angles: vec![-0.2, 0.0, 0.2] }
    }
}

/// Wave-module tuning: a sinusoidal vertical weave.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveModuleConfig {
    /// Vertical weave amplitude.
    pub amplitude: f32,
    /// Weave frequency, Hz.
    pub frequency: f32,
    /// Which projectile archetype this module fires.
    pub projectile_type: u8,
}

impl Default for WaveModuleConfig {
    fn default() -> Self {
        Self { amplitude: 40.0, frequency: 2.0, projectile_type: 2 }
    }
}

/// Player-equippable secondary weapon tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Seconds between module shots.
    pub fire_cooldown: f32,
    /// Base projectile travel speed shared by all module kinds.
    pub base_speed: f32,
    /// Spawn velocity X inherited from the firing ship.
    pub spawn_vx: f32,
    /// Homing kind.
    pub homing: HomingModuleConfig,
    /// Spread-shot kind.
    pub spread: SpreadModuleConfig,
    /// Sine-weave kind.
    pub wave: WaveModuleConfig,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            fire_cooldown: 1.0,
            base_speed: 500.0,
            spawn_vx: 0.0,
            homing: HomingModuleConfig::default(),
            spread: SpreadModuleConfig::default(),
            wave: WaveModuleConfig::default(),
        }
    }
}

/// Boss-damage ("orange") pickup tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrangePowerupConfig {
    /// Fraction of the boss's remaining hp dealt on pickup.
    pub boss_damage_fraction: f32,
}

impl Default for OrangePowerupConfig {
    fn default() -> Self {
        Self { boss_damage_fraction: 0.1 }
    }
}

/// Shield ("blue") pickup tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluePowerupConfig {
    /// Shield duration in seconds once picked up.
    pub duration: f32,
}

impl Default for BluePowerupConfig {
    fn default() -> Self {
        Self { duration: 8.0 }
    }
}

/// Pickup spawn and effect tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerupConfig {
    /// Drift velocity X once spawned.
    pub spawn_vx: f32,
    /// Fixed spawn X.
    pub spawn_x: f32,
    /// Minimum spawn Y.
    pub spawn_y_min: f32,
    /// Added to `spawn_y_min`, scaled by a uniform `[0,1)` draw.
    pub spawn_y_range: f32,
    /// Boss-damage kind.
    pub orange: OrangePowerupConfig,
    /// Shield kind.
    pub blue: BluePowerupConfig,
}

impl Default for PowerupConfig {
    fn default() -> Self {
        Self {
            spawn_vx: -80.0,
            spawn_x: 1920.0,
            spawn_y_min: 50.0,
            spawn_y_range: 980.0,
            orange: OrangePowerupConfig::default(),
            blue: BluePowerupConfig::default(),
        }
    }
}

/// The complete gameplay tuning record (§3.1): everything the simulation
/// reads from its external "scripting configuration layer" collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    /// Player movement and spawn tuning.
    pub player: PlayerConfig,
    /// Enemy archetypes and the spawner that places them.
    pub enemies: EnemyConfig,
    /// Boss encounter tuning.
    pub boss: BossConfig,
    /// Player and enemy projectile tuning.
    pub projectiles: ProjectileConfig,
    /// Secondary-weapon module tuning.
    pub modules: ModuleConfig,
    /// Pickup tuning.
    pub powerups: PowerupConfig,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            player: PlayerConfig::default(),
            enemies: EnemyConfig::default(),
            boss: BossConfig::default(),
            projectiles: ProjectileConfig::default(),
            modules: ModuleConfig::default(),
            powerups: PowerupConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_literals() {
        let config = CoreConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.snapshot_rate, 30);
        assert_eq!(config.session_timeout_secs, 5);
        assert_eq!(GameplayConfig::default().player.speed, 500.0);
    }

    #[test]
    fn empty_toml_falls_back_to_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = CoreConfig::from_toml_str("port = 9000\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.tick_rate, 60);
    }

    #[test]
    fn out_of_range_max_player_ships_is_rejected() {
        let err = CoreConfig::from_toml_str("max_player_ships = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "max_player_ships" }));
    }

    #[test]
    fn snapshot_rate_above_tick_rate_is_rejected() {
        let err = CoreConfig::from_toml_str("tick_rate = 10\nsnapshot_rate = 20\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "snapshot_rate" }));
    }

    #[test]
    fn gameplay_config_round_trips_through_toml() {
        let config = GameplayConfig::default();
        let toml_text = toml::to_string(&config).unwrap();
        let parsed: GameplayConfig = toml::from_str(&toml_text).unwrap();
        assert_eq!(config, parsed);
    }
}
