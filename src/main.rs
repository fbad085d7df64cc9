use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use pexeso_server::config::{self, LogFormat, LogLevel};
use pexeso_server::logging;
use pexeso_server::server::AppState;

/// A lightweight, in-memory TCP server for multiplayer Pexeso (memory /
/// pairs-matching) games.
///
/// Positional arguments follow spec.md §6's `server <ip> <port>
/// <max_rooms> <max_clients>` shape; the optional flags below configure the
/// ambient layers (config file, logging) that sit outside the wire
/// protocol.
#[derive(Parser, Debug)]
#[command(name = "pexeso-server")]
#[command(about = "A TCP server for multiplayer Pexeso (memory/pairs) games")]
#[command(version)]
struct Cli {
    /// IP address to bind the listening socket to.
    ip: String,

    /// TCP port to listen on, in 1..=65535.
    port: u16,

    /// Maximum number of concurrently open rooms.
    max_rooms: usize,

    /// Maximum number of concurrently connected clients.
    max_clients: usize,

    /// Optional JSON configuration file (defaults and env vars fill the rest).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured log format (text or json).
    #[arg(long)]
    log_format: Option<String>,

    /// Override the configured log level (trace/debug/info/warn/error).
    #[arg(long)]
    log_level: Option<String>,

    /// Print the resolved configuration as JSON and exit without binding.
    #[arg(long)]
    print_config: bool,
}

fn validate_args(cli: &Cli) -> Result<(), String> {
    if cli.port == 0 {
        return Err("port must be in 1..=65535".to_string());
    }
    if cli.max_rooms == 0 {
        return Err("max_rooms must be > 0".to_string());
    }
    if cli.max_clients == 0 {
        return Err("max_clients must be > 0".to_string());
    }
    if cli.ip.parse::<std::net::IpAddr>().is_err() {
        return Err(format!("invalid bind ip '{}'", cli.ip));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(msg) = validate_args(&cli) {
        eprintln!("invalid arguments: {msg}");
        std::process::exit(1);
    }

    let mut cfg = config::load(cli.config.as_deref()).unwrap_or_else(|err| {
        eprintln!("invalid arguments: {err}");
        std::process::exit(1);
    });

    // CLI positional arguments take final precedence over config
    // file/environment (spec.md §6, SPEC_FULL.md §6).
    cfg.bind_ip = cli.ip.clone();
    cfg.port = cli.port;
    cfg.max_rooms = cli.max_rooms;
    cfg.max_clients = cli.max_clients;

    if let Some(format) = &cli.log_format {
        match format.parse::<LogFormat>() {
            Ok(parsed) => cfg.logging.format = parsed,
            Err(err) => {
                eprintln!("invalid arguments: {err}");
                std::process::exit(1);
            }
        }
    }
    if let Some(level) = &cli.log_level {
        match level.parse::<LogLevel>() {
            Ok(parsed) => cfg.logging.level = Some(parsed),
            Err(err) => {
                eprintln!("invalid arguments: {err}");
                std::process::exit(1);
            }
        }
    }

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)?;
        println!("{json}");
        return Ok(());
    }

    logging::init_with_config(&cfg.logging);

    let addr: SocketAddr = format!("{}:{}", cfg.bind_ip, cfg.port)
        .parse()
        .map_err(|err| anyhow::anyhow!("failed to build bind address: {err}"))?;

    tracing::info!(%addr, max_rooms = cfg.max_rooms, max_clients = cfg.max_clients, "starting pexeso-server");

    let listener = TcpListener::bind(addr).await.map_err(|err| {
        tracing::error!(%addr, error = %err, "failed to bind listener");
        anyhow::anyhow!("failed to bind {addr}: {err}")
    })?;

    let state = AppState::new(cfg.max_rooms, cfg.max_clients);

    let heartbeat_handle = tokio::spawn(pexeso_server::server::heartbeat_task(state.clone()));
    let reaper_handle = tokio::spawn(pexeso_server::server::reaper_task(state.clone()));

    let acceptor_state = state.clone();
    let acceptor_handle = tokio::spawn(async move {
        pexeso_server::server::run(acceptor_state, listener).await;
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
        }
        () = state.shutdown.cancelled() => {}
    }

    run_shutdown_sequence(state, acceptor_handle, heartbeat_handle, reaper_handle).await;

    tracing::info!("server shut down cleanly");
    Ok(())
}

/// The ordered teardown from spec.md §4.8: announce, give clients a moment
/// to see it, force-close every transport, join the supervisors (they may
/// still reference client records), only then destroy rooms (freeing
/// games), and finally free the client registry.
async fn run_shutdown_sequence(
    state: Arc<AppState>,
    acceptor_handle: tokio::task::JoinHandle<()>,
    heartbeat_handle: tokio::task::JoinHandle<()>,
    reaper_handle: tokio::task::JoinHandle<()>,
) {
    pexeso_server::server::shutdown(&state, "server is shutting down").await;

    let _ = acceptor_handle.await;
    let _ = heartbeat_handle.await;
    let _ = reaper_handle.await;

    // Give in-flight session tasks a moment to observe their closed
    // transports and run their own teardown before registries are torn down
    // out from under them.
    tokio::time::sleep(Duration::from_secs(3)).await;

    for room_id in state.rooms.all_room_ids() {
        state.rooms.destroy(room_id);
    }
    state.clients.clear();
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn parses_required_positional_arguments() {
        let cli = Cli::try_parse_from(["pexeso-server", "0.0.0.0", "7878", "64", "256"]).unwrap();
        assert_eq!(cli.ip, "0.0.0.0");
        assert_eq!(cli.port, 7878);
        assert_eq!(cli.max_rooms, 64);
        assert_eq!(cli.max_clients, 256);
        assert!(!cli.print_config);
    }

    #[test]
    fn rejects_missing_arguments() {
        let result = Cli::try_parse_from(["pexeso-server", "0.0.0.0", "7878"]);
        assert!(result.is_err());
    }

    #[test]
    fn validate_args_rejects_zero_port() {
        let cli = Cli::try_parse_from(["pexeso-server", "0.0.0.0", "0", "64", "256"]).unwrap();
        assert!(validate_args(&cli).is_err());
    }

    #[test]
    fn validate_args_rejects_zero_capacity() {
        let cli = Cli::try_parse_from(["pexeso-server", "0.0.0.0", "7878", "0", "256"]).unwrap();
        assert!(validate_args(&cli).is_err());
    }

    #[test]
    fn validate_args_accepts_sane_input() {
        let cli = Cli::try_parse_from(["pexeso-server", "127.0.0.1", "7878", "64", "256"]).unwrap();
        assert!(validate_args(&cli).is_ok());
    }

    #[test]
    fn validate_args_rejects_unparseable_ip() {
        let cli = Cli::try_parse_from(["pexeso-server", "not-an-ip", "7878", "64", "256"]).unwrap();
        assert!(validate_args(&cli).is_err());
    }
}
