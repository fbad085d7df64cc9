//! Per-command dispatch: precondition checks, registry/game mutation, and
//! the responses/broadcasts each command produces.
//!
//! Grounded on the teacher's message-handler modules (one function per
//! inbound message type, sharing a result-to-wire-error funnel) but
//! reworked around this spec's `ServerError`/`ErrorCode` taxonomy instead of
//! the teacher's signaling-specific rejections.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};
use crate::model::client::{ClientSession, ClientState};
use crate::model::game::{Game, GameState, MatchOutcome};
use crate::protocol::command::ClientCommand;
use crate::protocol::constants::RECONNECT_TIMEOUT;
use crate::protocol::error_codes::ErrorCode;
use crate::protocol::response::ServerResponse;

use super::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Close,
}

/// Parse and run one line. `client_id` is `&mut` because a successful
/// `RECONNECT` changes which session the read loop is now driving.
pub async fn dispatch_line(client_id: &mut u32, line: &str, state: &Arc<AppState>) -> LoopControl {
    let command = match ClientCommand::parse(line) {
        Ok(cmd) => cmd,
        Err(err) => return report_error(state, *client_id, err).await,
    };

    let Some(client) = state.clients.find_by_id(*client_id) else {
        return LoopControl::Close;
    };

    if let ClientCommand::Reconnect { old_client_id } = command {
        if client.state != ClientState::Connected {
            let err = ServerError::new(ErrorCode::AlreadyAuthenticated, "already authenticated");
            return report_error(state, *client_id, err).await;
        }
        return handle_reconnect(client_id, old_client_id, state).await;
    }

    let result = match command {
        ClientCommand::Hello { nickname } => handle_hello(&client, nickname, state).await,
        ClientCommand::ListRooms => handle_list_rooms(&client, state).await,
        ClientCommand::CreateRoom { name, max_players, board_size } => {
            handle_create_room(&client, name, max_players, board_size, state).await
        }
        ClientCommand::JoinRoom { room_id } => handle_join_room(&client, room_id, state).await,
        ClientCommand::LeaveRoom => handle_leave_room(&client, state).await,
        ClientCommand::StartGame => handle_start_game(&client, state).await,
        ClientCommand::Ready => handle_ready(&client, state).await,
        ClientCommand::Flip { index } => handle_flip(&client, index, state).await,
        ClientCommand::Pong => {
            handle_pong(&client, state);
            Ok(())
        }
        ClientCommand::Reconnect { .. } => unreachable!("handled above"),
    };

    match result {
        Ok(()) => LoopControl::Continue,
        Err(err) => report_error(state, *client_id, err).await,
    }
}

async fn report_error(state: &Arc<AppState>, client_id: u32, err: ServerError) -> LoopControl {
    send_error(state, client_id, err.code, Some(err.message)).await
}

/// Send `ERROR <code>` and, for protocol-level violations, bump the
/// session's error counter — closing the transport once it crosses
/// `MAX_ERROR_COUNT` (spec.md §4.5 point 6).
pub(crate) async fn send_error(state: &Arc<AppState>, client_id: u32, code: ErrorCode, detail: Option<String>) -> LoopControl {
    let increments = code.increments_error_counter();

    let exceeded = state
        .clients
        .mutate(client_id, |c| {
            let _ = c.transport.send(&ServerResponse::Error { code, detail: detail.clone() });
            if increments {
                c.invalid_message_count += 1;
            }
            increments && c.invalid_message_count >= crate::protocol::constants::MAX_ERROR_COUNT
        })
        .unwrap_or(false);

    state.metrics.record_command_error(exceeded);

    if exceeded {
        warn!(client_id, "error limit reached, closing transport");
        if let Some(client) = state.clients.find_by_id(client_id) {
            client.transport.close();
        }
        LoopControl::Close
    } else {
        LoopControl::Continue
    }
}

fn nickname_of(state: &Arc<AppState>, client_id: u32) -> String {
    state
        .clients
        .find_by_id(client_id)
        .and_then(|c| c.nickname)
        .unwrap_or_else(|| "(unknown)".to_string())
}

fn require_authenticated(client: &ClientSession) -> ServerResult<()> {
    if client.state == ClientState::Connected {
        return Err(ServerError::new(ErrorCode::NotAuthenticated, "send HELLO first"));
    }
    Ok(())
}

fn require_not_in_room(client: &ClientSession) -> ServerResult<()> {
    if client.room_id.is_some() {
        return Err(ServerError::new(ErrorCode::AlreadyInRoom, "already a member of a room"));
    }
    Ok(())
}

fn require_in_room(client: &ClientSession) -> ServerResult<u32> {
    client.room_id.ok_or_else(|| ServerError::new(ErrorCode::NotInRoom, "not currently in a room"))
}

async fn handle_hello(client: &ClientSession, nickname: String, state: &Arc<AppState>) -> ServerResult<()> {
    if client.state != ClientState::Connected {
        return Err(ServerError::new(ErrorCode::AlreadyAuthenticated, "already authenticated"));
    }
    let client_id = client.client_id;
    state.clients.mutate(client_id, |c| {
        c.nickname = Some(nickname.clone());
        c.state = ClientState::InLobby;
    });
    client.transport.send(&ServerResponse::Welcome { client_id, message: None });
    info!(client_id, %nickname, "client authenticated");
    Ok(())
}

async fn handle_list_rooms(client: &ClientSession, state: &Arc<AppState>) -> ServerResult<()> {
    require_authenticated(client)?;
    let rooms = state.rooms.list_for_lobby();
    client.transport.send(&ServerResponse::RoomList { rooms });
    Ok(())
}

async fn handle_create_room(
    client: &ClientSession,
    name: String,
    max_players: u8,
    board_size: u8,
    state: &Arc<AppState>,
) -> ServerResult<()> {
    require_authenticated(client)?;
    require_not_in_room(client)?;
    let room_id = state.rooms.create(name.clone(), max_players, board_size, client.client_id)?;
    state.metrics.record_room_created();
    client.transport.send(&ServerResponse::RoomCreated { room_id, name });
    Ok(())
}

async fn handle_join_room(client: &ClientSession, room_id: u32, state: &Arc<AppState>) -> ServerResult<()> {
    require_authenticated(client)?;
    require_not_in_room(client)?;
    state.rooms.add_player(room_id, client.client_id)?;
    let room = state.rooms.find_by_id(room_id).expect("just joined it");
    client.transport.send(&ServerResponse::RoomJoined { room_id, name: room.name.clone() });
    state.rooms.broadcast_except(
        room_id,
        &ServerResponse::PlayerJoined { nickname: client.nickname_or_unknown().to_string() },
        client.client_id,
    );
    Ok(())
}

async fn handle_leave_room(client: &ClientSession, state: &Arc<AppState>) -> ServerResult<()> {
    let room_id = require_in_room(client)?;
    let client_id = client.client_id;
    let nickname = client.nickname_or_unknown().to_string();

    let effects = state.rooms.remove_player(room_id, client_id)?;
    state.clients.mutate(client_id, |c| {
        c.room_id = None;
        c.state = ClientState::InLobby;
    });
    client.transport.send(&ServerResponse::LeftRoom);

    if effects.room_destroyed {
        state.metrics.record_room_destroyed();
        if effects.forfeit_scores.is_some() {
            state.metrics.record_game_forfeited();
        }
    } else {
        state.rooms.broadcast_except(room_id, &ServerResponse::PlayerLeft { nickname }, client_id);
    }
    Ok(())
}

async fn handle_start_game(client: &ClientSession, state: &Arc<AppState>) -> ServerResult<()> {
    let room_id = require_in_room(client)?;
    let client_id = client.client_id;

    let room = state
        .rooms
        .find_by_id(room_id)
        .ok_or_else(|| ServerError::new(ErrorCode::NotInRoom, "room no longer exists"))?;
    if room.owner != client_id {
        return Err(ServerError::new(ErrorCode::NotRoomOwner, "only the room owner can start the game"));
    }
    if room.game.is_some() {
        return Err(ServerError::new(ErrorCode::InvalidMove, "a game already exists for this room"));
    }
    if room.player_count() != room.max_players {
        return Err(ServerError::new(ErrorCode::NeedMorePlayers, "room is not yet full"));
    }

    let game = create_game(state, room.board_size, room.member_ids(), room_id)?;
    let board_size = room.board_size;
    let members = room.member_ids();

    state.rooms.mutate(room_id, |r| {
        r.game = Some(game);
        r.state = crate::model::room::RoomState::Playing;
    });
    state.metrics.record_game_started();

    for member in members {
        state.clients.mutate(member, |c| c.state = ClientState::InGame);
    }

    state.rooms.broadcast(
        room_id,
        &ServerResponse::GameCreated { board_size, reminder: "send READY to begin".to_string() },
    );
    Ok(())
}

/// Build a fresh game for a room, drawing from the thread RNG in
/// production or a per-room-deterministic seed when `state.test_seed` is
/// set (spec.md §9: "make the shuffle seedable... for tests").
fn create_game(state: &Arc<AppState>, board_size: u8, players: Vec<u32>, room_id: u32) -> ServerResult<Game> {
    match state.test_seed {
        Some(seed) => {
            use rand::SeedableRng;
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed ^ u64::from(room_id));
            Game::create_with_rng(board_size, players, &mut rng)
        }
        None => Game::create(board_size, players),
    }
}

async fn handle_ready(client: &ClientSession, state: &Arc<AppState>) -> ServerResult<()> {
    let room_id = require_in_room(client)?;
    let client_id = client.client_id;
    let nickname = client.nickname_or_unknown().to_string();

    let all_ready = state
        .rooms
        .mutate(room_id, |r| match r.game.as_mut() {
            Some(game) => {
                game.player_ready(client_id)?;
                Ok(game.all_players_ready())
            }
            None => Err(ServerError::new(ErrorCode::GameNotStarted, "no game is waiting for ready")),
        })
        .ok_or_else(|| ServerError::new(ErrorCode::NotInRoom, "room no longer exists"))??;

    client.transport.send(&ServerResponse::ReadyOk);
    state.rooms.broadcast_except(room_id, &ServerResponse::PlayerReady { nickname }, client_id);

    if !all_ready {
        return Ok(());
    }

    let (board_size, player_ids) = state
        .rooms
        .mutate(room_id, |r| {
            let game = r.game.as_mut().expect("all_players_ready implies a game exists");
            game.start()?;
            Ok::<(u8, Vec<u32>), ServerError>((r.board_size, game.players.clone()))
        })
        .expect("room existed moments ago")?;

    let nicknames: Vec<String> = player_ids.iter().map(|&id| nickname_of(state, id)).collect();
    state.rooms.broadcast(room_id, &ServerResponse::GameStart { board_size, nicknames });

    if let Some(&first) = player_ids.first() {
        if let Some(first_client) = state.clients.find_by_id(first) {
            first_client.transport.send(&ServerResponse::YourTurn);
        }
    }
    Ok(())
}

async fn handle_flip(client: &ClientSession, index: usize, state: &Arc<AppState>) -> ServerResult<()> {
    let room_id = require_in_room(client)?;
    let client_id = client.client_id;

    let (value, flips_after) = state
        .rooms
        .mutate(room_id, |r| match r.game.as_mut() {
            Some(game) => {
                let value = game.flip_card(client_id, index)?;
                Ok((value, game.flips_this_turn))
            }
            None => Err(ServerError::new(ErrorCode::GameNotStarted, "no game for this room")),
        })
        .ok_or_else(|| ServerError::new(ErrorCode::NotInRoom, "room no longer exists"))??;

    let nickname = client.nickname_or_unknown().to_string();
    state.rooms.broadcast(room_id, &ServerResponse::CardReveal { index, value, nickname });

    if flips_after < 2 {
        return Ok(());
    }

    let outcome = state
        .rooms
        .mutate(room_id, |r| r.game.as_mut().expect("just flipped into this game").check_match())
        .expect("room existed moments ago")?;

    match outcome {
        MatchOutcome::Matched { scorer, new_score, finished } => {
            let scorer_nick = nickname_of(state, scorer);
            state.rooms.broadcast(room_id, &ServerResponse::Match { nickname: scorer_nick, score: new_score });
            if finished {
                finish_game(room_id, state).await;
            } else if let Some(scorer_client) = state.clients.find_by_id(scorer) {
                scorer_client.transport.send(&ServerResponse::YourTurn);
            }
        }
        MatchOutcome::Mismatched { next_player } => {
            let next_nick = nickname_of(state, next_player);
            state.rooms.broadcast(room_id, &ServerResponse::Mismatch { next_nickname: next_nick });
            if let Some(next_client) = state.clients.find_by_id(next_player) {
                next_client.transport.send(&ServerResponse::YourTurn);
            }
        }
    }
    Ok(())
}

async fn finish_game(room_id: u32, state: &Arc<AppState>) {
    let Some(room) = state.rooms.find_by_id(room_id) else { return };
    let Some(game) = room.game.as_ref() else { return };

    let names: HashMap<u32, String> = game.players.iter().map(|&id| (id, nickname_of(state, id))).collect();
    let scores = game.scored_pairs(|id| names.get(&id).map(String::as_str).unwrap_or("(unknown)"));

    state.rooms.mutate(room_id, |r| r.state = crate::model::room::RoomState::Finished);
    state.metrics.record_game_finished();
    state.rooms.broadcast(room_id, &ServerResponse::GameEnd { scores });
}

fn handle_pong(client: &ClientSession, state: &Arc<AppState>) {
    let now = Instant::now();
    state.clients.mutate(client.client_id, |c| {
        c.waiting_for_pong = false;
        c.last_pong_received = now;
        c.last_activity = now;
    });
}

/// `RECONNECT <old_client_id>`: restores identity and context onto the
/// current (freshly authenticated) connection. See spec.md §4.6.
async fn handle_reconnect(client_id: &mut u32, old_client_id: u32, state: &Arc<AppState>) -> LoopControl {
    let current_id = *client_id;
    let Some(current) = state.clients.find_by_id(current_id) else {
        return LoopControl::Close;
    };

    let Some(old) = state.clients.find_by_id(old_client_id) else {
        state.metrics.record_reconnect_rejected();
        return send_error(state, current_id, ErrorCode::InvalidParams, Some("unknown client_id".to_string())).await;
    };
    if !old.is_disconnected() {
        state.metrics.record_reconnect_rejected();
        return send_error(state, current_id, ErrorCode::InvalidParams, Some("original session is still live".to_string())).await;
    }
    let now = Instant::now();
    let elapsed = old.disconnect_time.map(|t| now.duration_since(t)).unwrap_or_default();
    if elapsed > RECONNECT_TIMEOUT {
        state.metrics.record_reconnect_rejected();
        return send_error(state, current_id, ErrorCode::InvalidParams, Some("reconnect window has expired".to_string())).await;
    }

    let mut restored = current.clone();
    restored.inherit_identity_from(&old);
    restored.last_activity = now;
    restored.last_ping_sent = None;
    restored.last_pong_received = now;
    restored.waiting_for_pong = false;
    restored.disconnect_time = None;
    restored.invalid_message_count = 0;
    restored.state = match restored.room_id.and_then(|rid| state.rooms.find_by_id(rid)) {
        Some(room) if room.game.as_ref().is_some_and(|g| g.state == GameState::Playing) => ClientState::InGame,
        Some(_) => ClientState::InRoom,
        None => ClientState::InLobby,
    };

    old.transport.close();
    state.clients.remove(current_id);
    if let Err(err) = state.clients.replace(old_client_id, restored.clone()) {
        warn!(old_client_id, error = %err, "reconnect replace failed");
        state.metrics.record_reconnect_rejected();
        return LoopControl::Close;
    }

    *client_id = old_client_id;
    state.metrics.record_reconnect_succeeded();
    info!(old_client_id, "client reconnected");

    restored.transport.send(&ServerResponse::Welcome {
        client_id: old_client_id,
        message: Some("Reconnected successfully".to_string()),
    });

    let Some(room_id) = restored.room_id else {
        return LoopControl::Continue;
    };

    state.rooms.broadcast_except(
        room_id,
        &ServerResponse::PlayerReconnected { nickname: restored.nickname_or_unknown().to_string() },
        old_client_id,
    );

    let Some(room) = state.rooms.find_by_id(room_id) else {
        return LoopControl::Continue;
    };

    match &room.game {
        Some(game) if game.state == GameState::Playing => {
            let names: HashMap<u32, String> = game.players.iter().map(|&id| (id, nickname_of(state, id))).collect();
            let scores = game.scored_pairs(|id| names.get(&id).map(String::as_str).unwrap_or("(unknown)"));
            let current_nickname = game
                .current_player()
                .map(|id| nickname_of(state, id))
                .unwrap_or_else(|| "(unknown)".to_string());
            restored.transport.send(&ServerResponse::GameState {
                board_size: room.board_size,
                current_nickname,
                scores,
                slots: game.visible_slots(),
            });
            if game.current_player() == Some(old_client_id) {
                restored.transport.send(&ServerResponse::YourTurn);
            }
        }
        Some(game) if game.state == GameState::Waiting => {
            restored.transport.send(&ServerResponse::RoomJoined { room_id, name: room.name.clone() });
            restored.transport.send(&ServerResponse::GameCreated {
                board_size: room.board_size,
                reminder: "send READY to begin".to_string(),
            });
        }
        _ => {
            restored.transport.send(&ServerResponse::RoomJoined { room_id, name: room.name.clone() });
        }
    }

    LoopControl::Continue
}
