use std::path::Path;

use super::types::Config;

/// Load configuration from an optional JSON file, then apply environment
/// variable overrides. CLI arguments are applied on top of this by
/// `main.rs`, which has the final say per argument.
///
/// Mirrors the precedence order of the teacher's `config::load()`: code
/// defaults are the floor, a config file overrides them, and environment
/// variables override the file. Missing/unreadable files are not fatal —
/// this only fails startup when `--config` pointed at a file that existed
/// but failed to parse.
pub fn load(config_path: Option<&Path>) -> anyhow::Result<Config> {
    let mut cfg = match config_path {
        Some(path) if path.exists() => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
            serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?
        }
        Some(path) => {
            tracing_fallback_warn(&format!("config file {} not found, using defaults", path.display()));
            Config::default()
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(ip) = std::env::var("PEXESO_BIND_IP") {
        cfg.bind_ip = ip;
    }
    if let Ok(port) = std::env::var("PEXESO_PORT") {
        if let Ok(port) = port.parse() {
            cfg.port = port;
        }
    }
    if let Ok(max_rooms) = std::env::var("PEXESO_MAX_ROOMS") {
        if let Ok(max_rooms) = max_rooms.parse() {
            cfg.max_rooms = max_rooms;
        }
    }
    if let Ok(max_clients) = std::env::var("PEXESO_MAX_CLIENTS") {
        if let Ok(max_clients) = max_clients.parse() {
            cfg.max_clients = max_clients;
        }
    }
    if let Ok(level) = std::env::var("RUST_LOG") {
        if cfg.logging.level.is_none() {
            cfg.logging.level = level.parse().ok();
        }
    }
}

/// Logging isn't initialized yet when `load` runs (config load happens
/// before `logging::init_with_config`), so this is a plain stderr write
/// rather than a `tracing` call.
fn tracing_fallback_warn(message: &str) {
    eprintln!("warning: {message}");
}
