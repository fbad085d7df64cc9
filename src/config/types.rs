use serde::{Deserialize, Serialize};

use super::defaults::{default_bind_ip, default_max_clients, default_max_rooms, default_port};
use super::logging::LoggingConfig;

/// Root configuration, loaded by [`super::loader::load`] from defaults, an
/// optional JSON file, environment variables, and finally CLI arguments (in
/// increasing precedence — see `main.rs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_rooms")]
    pub max_rooms: usize,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_ip: default_bind_ip(),
            port: default_port(),
            max_rooms: default_max_rooms(),
            max_clients: default_max_clients(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 7878);
        assert!(cfg.max_rooms > 0);
        assert!(cfg.max_clients > 0);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = Config::default();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.port, parsed.port);
        assert_eq!(cfg.max_clients, parsed.max_clients);
    }
}
