//! Scenario 2 from spec.md §8: two clients create/join a room, ready up,
//! and the game starts with the first seated player on turn.

mod common;

use common::TestServer;

#[tokio::test]
async fn two_player_room_creation_through_game_start() {
    let server = TestServer::start(8, 8).await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    a.send("HELLO A").await;
    assert_eq!(a.recv_line().await, "WELCOME 1");
    b.send("HELLO B").await;
    assert_eq!(b.recv_line().await, "WELCOME 2");

    a.send("CREATE_ROOM game1 2 4").await;
    assert_eq!(a.recv_line().await, "ROOM_CREATED 1 game1");

    b.send("JOIN_ROOM 1").await;
    assert_eq!(b.recv_line().await, "ROOM_JOINED 1 game1");
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
}

#[tokio::test]
async fn starting_a_game_alone_in_an_undersized_room_is_rejected() {
    let server = TestServer::start(8, 8).await;
    let mut a = server.connect().await;

    a.send("HELLO A").await;
    a.recv_line().await;

    a.send("CREATE_ROOM solo 2 4").await;
    a.recv_line().await;

    a.send("START_GAME").await;
    let line = a.recv_line().await;
    assert!(line.starts_with("ERROR "), "expected a rejection, got {line:?}");
}
