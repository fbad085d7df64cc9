//! Default-value functions used by `#[serde(default = "...")]` attributes
//! across the config module, and the hard-coded protocol constants that are
//! not meant to be configurable (the timeouts fixed by spec.md §5).

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub fn default_bind_ip() -> String {
    "0.0.0.0".to_string()
}

pub const fn default_port() -> u16 {
    7878
}

pub const fn default_max_rooms() -> usize {
    64
}

pub const fn default_max_clients() -> usize {
    256
}
