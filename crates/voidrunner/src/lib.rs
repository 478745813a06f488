//! # Voidrunner
//!
//! Home crate for the dedicated server binary. It owns nothing but process
//! startup — argument parsing, config file loading, tracing
//! initialization — and the exit-code contract (§6). All protocol,
//! simulation, and prediction logic lives in [`voidrunner_core`], so a
//! future bot/test client binary can link it without pulling in any of
//! this crate's startup concerns.

#![deny(missing_docs)]
#![deny(unsafe_code)]

/// Re-export of the authoritative multiplayer core.
pub use voidrunner_core as core;

use std::fs;
use std::path::Path;

use voidrunner_core::config::{CoreConfig, GameplayConfig};
use voidrunner_core::error::ConfigError;

/// Default path for the process-level config file (§6.1).
pub const DEFAULT_CORE_CONFIG_PATH: &str = "core_server.toml";

/// Default path for the gameplay tuning file.
pub const DEFAULT_GAMEPLAY_CONFIG_PATH: &str = "gameplay.toml";

/// Loads [`CoreConfig`] from `path`, falling back to its defaults if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for any read failure other than the file
/// being absent, [`ConfigError::Parse`] for malformed TOML, and
/// [`ConfigError::OutOfRange`] if a validated field is outside its
/// documented range.
pub fn load_core_config(path: &Path) -> Result<CoreConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(source) => CoreConfig::from_toml_str(&source),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(CoreConfig::default()),
        Err(err) => Err(ConfigError::Io(err)),
    }
}

/// Loads [`GameplayConfig`] from `path`, falling back to its defaults if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for any read failure other than the file
/// being absent, or [`ConfigError::Parse`] for malformed TOML. Gameplay
/// tuning has no cross-field range to validate.
pub fn load_gameplay_config(path: &Path) -> Result<GameplayConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(source) => Ok(toml::from_str(&source)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(GameplayConfig::default()),
        Err(err) => Err(ConfigError::Io(err)),
    }
}
