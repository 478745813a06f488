//! # Voidrunner Server
//!
//! The authoritative dedicated server.
//!
//! ## Usage
//!
//! ```text
//! voidrunner_server [--config <path>] [--gameplay-config <path>] [--port <port>]
//! ```
//!
//! `--config` defaults to `core_server.toml`; `--gameplay-config` defaults
//! to `gameplay.toml`. Either falls back to its record's `Default` if the
//! file does not exist. `--port` overrides the config's `port` field.
//!
//! Exit codes (§6): `0` on a clean shutdown, `1` if the socket could not be
//! bound or failed fatally, `2` if a config file exists but is malformed or
//! out of range.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use voidrunner::core::server::Server;
use voidrunner::{load_core_config, load_gameplay_config, DEFAULT_CORE_CONFIG_PATH, DEFAULT_GAMEPLAY_CONFIG_PATH};

struct Args {
    config_path: PathBuf,
    gameplay_config_path: PathBuf,
    port_override: Option<u16>,
}

fn parse_args() -> Args {
    let mut config_path = PathBuf::from(DEFAULT_CORE_CONFIG_PATH);
    let mut gameplay_config_path = PathBuf::from(DEFAULT_GAMEPLAY_CONFIG_PATH);
    let mut port_override = None;

    let raw: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "--config" => {
                if let Some(value) = raw.get(i + 1) {
                    config_path = PathBuf::from(value);
                    i += 1;
                }
            }
            "--gameplay-config" => {
                if let Some(value) = raw.get(i + 1) {
                    gameplay_config_path = PathBuf::from(value);
                    i += 1;
                }
            }
            "--port" => {
                if let Some(value) = raw.get(i + 1) {
                    port_override = value.parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: voidrunner_server [--config <path>] [--gameplay-config <path>] [--port <port>]");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    Args { config_path, gameplay_config_path, port_override }
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = parse_args();

    let mut core_config = match load_core_config(&args.config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(path = %args.config_path.display(), %err, "failed to load core config");
            std::process::exit(2);
        }
    };
    if let Some(port) = args.port_override {
        core_config.port = port;
    }

    let gameplay_config = match load_gameplay_config(&args.gameplay_config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(path = %args.gameplay_config_path.display(), %err, "failed to load gameplay config");
            std::process::exit(2);
        }
    };

    let bind_addr: SocketAddr = format!("0.0.0.0:{}", core_config.port)
        .parse()
        .expect("formatted bind address is always valid");

    tracing::info!(?bind_addr, tick_rate = core_config.tick_rate, snapshot_rate = core_config.snapshot_rate, "starting voidrunner server");

    let server = Server::new(core_config, gameplay_config);
    match server.run(bind_addr) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            tracing::error!(%err, "fatal transport error");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_point_at_the_conventional_filenames() {
        assert_eq!(Path::new(DEFAULT_CORE_CONFIG_PATH), Path::new("core_server.toml"));
        assert_eq!(Path::new(DEFAULT_GAMEPLAY_CONFIG_PATH), Path::new("gameplay.toml"));
    }
}
