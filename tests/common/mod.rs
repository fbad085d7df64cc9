//! Shared harness for the end-to-end scenario tests (spec.md §8): spins up
//! a real `AppState` behind a real `TcpListener` on an ephemeral port, with
//! the acceptor, heartbeat, and reaper tasks running exactly as `main.rs`
//! wires them up.

use std::net::SocketAddr;
use std::time::Duration;

use pexeso_server::server::{self, AppState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// A running server instance for the lifetime of one test.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: std::sync::Arc<AppState>,
}

impl TestServer {
    pub async fn start(max_rooms: usize, max_clients: usize) -> Self {
        Self::start_with_seed(max_rooms, max_clients, None).await
    }

    pub async fn start_with_seed(max_rooms: usize, max_clients: usize, seed: Option<u64>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let state = match seed {
            Some(seed) => AppState::new_with_seed(max_rooms, max_clients, seed),
            None => AppState::new(max_rooms, max_clients),
        };

        let acceptor_state = state.clone();
        tokio::spawn(async move {
            server::run(acceptor_state, listener).await;
        });
        tokio::spawn(server::heartbeat_task(state.clone()));
        tokio::spawn(server::reaper_task(state.clone()));

        Self { addr, state }
    }

    pub async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.addr).await.expect("connect to test server");
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        Client { reader: BufReader::new(read_half), writer: write_half }
    }
}

/// One client's half of the wire: a line writer and a line reader, each with
/// a generous timeout so a protocol mismatch fails the test instead of
/// hanging it.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.expect("write line");
        self.writer.write_all(b"\n").await.expect("write newline");
    }

    pub async fn recv_line(&mut self) -> String {
        let mut buf = String::new();
        let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut buf))
            .await
            .expect("timed out waiting for a server line")
            .expect("read_line failed");
        assert!(n > 0, "connection closed while waiting for a line");
        buf.trim_end_matches(['\r', '\n']).to_string()
    }

    /// Simulate an abrupt disconnect by dropping both socket halves.
    pub fn disconnect(self) {
        drop(self);
    }
}
