//! Scenario 5 from spec.md §8 (disconnect + reconnect mid-game) and the
//! companion branch of spec.md §4.5 it sits next to.
//!
//! §4.5 opens the reconnect window only when fewer than two *other* players
//! remain connected; with exactly two players in the room that's always
//! true, so a two-player game is the minimal setup that exercises the SHORT
//! + RECONNECT path end to end. A three-player game where two others remain
//! connected takes the opposite branch (immediate REMOVED, no window) —
//! covered by the second test below, and recorded as a DESIGN.md open
//! question resolution since spec.md §8's own three-player illustration of
//! the SHORT path doesn't actually satisfy its own §4.5 threshold.

mod common;

use common::TestServer;

#[tokio::test]
async fn short_disconnect_opens_a_reconnect_window_that_restores_game_state() {
    let server = TestServer::start(8, 8).await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    a.send("HELLO A").await;
    assert_eq!(a.recv_line().await, "WELCOME 1");
    b.send("HELLO B").await;
    assert_eq!(b.recv_line().await, "WELCOME 2");

    a.send("CREATE_ROOM g 2 4").await;
    assert_eq!(a.recv_line().await, "ROOM_CREATED 1 g");
    b.send("JOIN_ROOM 1").await;
    assert_eq!(b.recv_line().await, "ROOM_JOINED 1 g");
    assert_eq!(a.recv_line().await, "PLAYER_JOINED B");

    a.send("START_GAME").await;
    assert_eq!(a.recv_line().await, "GAME_CREATED 4 send READY to begin");
    assert_eq!(b.recv_line().await, "GAME_CREATED 4 send READY to begin");

    a.send("READY").await;
    assert_eq!(a.recv_line().await, "READY_OK");
    assert_eq!(b.recv_line().await, "PLAYER_READY A");
    b.send("READY").await;
    assert_eq!(b.recv_line().await, "READY_OK");
    assert_eq!(a.recv_line().await, "PLAYER_READY B");
    assert_eq!(a.recv_line().await, "GAME_START 4 A B");
    assert_eq!(b.recv_line().await, "GAME_START 4 A B");
    assert_eq!(a.recv_line().await, "YOUR_TURN");

    // B drops the connection mid-game, before flipping anything. Only one
    // other player (A) remains, so the room defers removal instead of
    // forfeiting immediately.
    b.disconnect();
    assert_eq!(a.recv_line().await, "PLAYER_DISCONNECTED B SHORT waiting for reconnect");

    // B reconnects with a fresh socket, well within the 90s window.
    let mut b2 = server.connect().await;
    b2.send("RECONNECT 2").await;
    assert_eq!(b2.recv_line().await, "WELCOME 2 Reconnected successfully");

    let expected_slots = " (0)".repeat(16);
    assert_eq!(b2.recv_line().await, format!("GAME_STATE 4 A (A 0) (B 0){expected_slots}"));

    assert_eq!(a.recv_line().await, "PLAYER_RECONNECTED B");
}

#[tokio::test]
async fn disconnect_with_two_others_connected_removes_immediately_and_hands_off_the_turn() {
    let server = TestServer::start(8, 8).await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    let mut c = server.connect().await;

    a.send("HELLO A").await;
    assert_eq!(a.recv_line().await, "WELCOME 1");
    b.send("HELLO B").await;
    assert_eq!(b.recv_line().await, "WELCOME 2");
    c.send("HELLO C").await;
    assert_eq!(c.recv_line().await, "WELCOME 3");

    a.send("CREATE_ROOM g 3 4").await;
    assert_eq!(a.recv_line().await, "ROOM_CREATED 1 g");
    b.send("JOIN_ROOM 1").await;
    assert_eq!(b.recv_line().await, "ROOM_JOINED 1 g");
    assert_eq!(a.recv_line().await, "PLAYER_JOINED B");
    c.send("JOIN_ROOM 1").await;
    assert_eq!(c.recv_line().await, "ROOM_JOINED 1 g");
    assert_eq!(a.recv_line().await, "PLAYER_JOINED C");
    assert_eq!(b.recv_line().await, "PLAYER_JOINED C");

    a.send("START_GAME").await;
    assert_eq!(a.recv_line().await, "GAME_CREATED 4 send READY to begin");
    assert_eq!(b.recv_line().await, "GAME_CREATED 4 send READY to begin");
    assert_eq!(c.recv_line().await, "GAME_CREATED 4 send READY to begin");

    a.send("READY").await;
    assert_eq!(a.recv_line().await, "READY_OK");
    assert_eq!(b.recv_line().await, "PLAYER_READY A");
    assert_eq!(c.recv_line().await, "PLAYER_READY A");
    b.send("READY").await;
    assert_eq!(b.recv_line().await, "READY_OK");
    assert_eq!(a.recv_line().await, "PLAYER_READY B");
    assert_eq!(c.recv_line().await, "PLAYER_READY B");
    c.send("READY").await;
    assert_eq!(c.recv_line().await, "READY_OK");
    assert_eq!(a.recv_line().await, "PLAYER_READY C");
    assert_eq!(b.recv_line().await, "PLAYER_READY C");

    assert_eq!(a.recv_line().await, "GAME_START 4 A B C");
    assert_eq!(b.recv_line().await, "GAME_START 4 A B C");
    assert_eq!(c.recv_line().await, "GAME_START 4 A B C");
    assert_eq!(a.recv_line().await, "YOUR_TURN");

    // A (the current player, and the room owner) drops. Two others (B, C)
    // remain connected, so the room removes A immediately and reassigns
    // both ownership and the turn rather than opening a reconnect window.
    a.disconnect();

    assert_eq!(b.recv_line().await, "ROOM_OWNER_CHANGED B");
    assert_eq!(c.recv_line().await, "ROOM_OWNER_CHANGED B");
    assert_eq!(b.recv_line().await, "PLAYER_DISCONNECTED A REMOVED Game continues");
    assert_eq!(c.recv_line().await, "PLAYER_DISCONNECTED A REMOVED Game continues");
    assert_eq!(b.recv_line().await, "YOUR_TURN");
}
