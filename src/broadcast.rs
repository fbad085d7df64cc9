use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::response::ServerResponse;

/// A client's outbound half: an unbounded channel feeding the connection's
/// dedicated writer task, plus a cancellation token the session's read loop
/// selects on. Keeping this separate from the registry's own structural lock
/// is what lets every other task (broadcast, heartbeat, reaper) hand a
/// message to a client, or force its transport closed, without ever touching
/// the socket or awaiting I/O while holding a registry lock.
#[derive(Debug, Clone)]
pub struct Transport {
    sender: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl Transport {
    pub fn new(sender: mpsc::UnboundedSender<String>, cancel: CancellationToken) -> Self {
        Self { sender, cancel }
    }

    /// Enqueue a response for delivery. Delivery order for a single client
    /// matches enqueue order (single channel, single writer task).
    ///
    /// Returns `false` if the writer task (and therefore the socket) has
    /// already gone away; callers generally just log this rather than treat
    /// it as fatal, since the liveness supervisor will reap the session.
    pub fn send(&self, response: &ServerResponse) -> bool {
        self.sender.send(response.render()).is_ok()
    }

    /// Force this client's session loop to stop and its socket to shut down.
    /// Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_enqueue_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = Transport::new(tx, CancellationToken::new());
        transport.send(&ServerResponse::Ping);
        transport.send(&ServerResponse::LeftRoom);
        assert_eq!(rx.recv().await.unwrap(), "PING");
        assert_eq!(rx.recv().await.unwrap(), "LEFT_ROOM");
    }

    #[tokio::test]
    async fn is_closed_reflects_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Transport::new(tx, CancellationToken::new());
        drop(rx);
        assert!(transport.is_closed());
        assert!(!transport.send(&ServerResponse::Ping));
    }

    #[test]
    fn close_is_idempotent_and_observable() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = Transport::new(tx, CancellationToken::new());
        assert!(!transport.is_closed());
        transport.close();
        transport.close();
        assert!(transport.is_closed());
    }
}
