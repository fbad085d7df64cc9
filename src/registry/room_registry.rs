use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::error::{server_err, ServerResult};
use crate::model::client::ClientState;
use crate::model::game::Game;
use crate::model::room::{Room, RoomState};
use crate::protocol::error_codes::ErrorCode;
use crate::protocol::response::{RoomListEntry, ServerResponse};
use crate::registry::client_registry::ClientRegistry;

struct Inner {
    slots: Vec<Option<Room>>,
    max_rooms: usize,
    next_room_id: u32,
    count: usize,
}

/// The outcome of removing a player from a room, describing what the
/// session handler still needs to announce (everything else — ownership
/// transfer, forfeit, destruction — has already happened by the time this
/// returns). See spec.md §4.3 for the four cascading cases this implements.
#[derive(Debug, Default)]
pub struct RemovalEffects {
    pub room_destroyed: bool,
    pub forfeit_scores: Option<Vec<(String, u32)>>,
    pub new_owner_nickname: Option<String>,
    pub ghost_room_closed: bool,
}

/// Fixed-capacity room table, protected by a single mutex. Holds the game
/// instances too (a room owns its game), matching the ownership forest in
/// spec.md §3: client registry owns clients, room registry owns rooms and
/// games, and all cross references are plain ids.
pub struct RoomRegistry {
    inner: Mutex<Inner>,
    clients: Arc<ClientRegistry>,
}

impl RoomRegistry {
    pub fn new(max_rooms: usize, clients: Arc<ClientRegistry>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: (0..max_rooms).map(|_| None).collect(),
                max_rooms,
                next_room_id: 1,
                count: 0,
            }),
            clients,
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("room registry mutex poisoned").max_rooms
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("room registry mutex poisoned").count
    }

    fn nickname_of(&self, client_id: u32) -> String {
        self.clients
            .find_by_id(client_id)
            .and_then(|c| c.nickname)
            .unwrap_or_else(|| "(unknown)".to_string())
    }

    pub fn create(&self, name: String, max_players: u8, board_size: u8, owner: u32) -> ServerResult<u32> {
        if name.is_empty() || name.len() > crate::protocol::constants::MAX_ROOM_NAME_LENGTH {
            return Err(server_err!(ErrorCode::InvalidParams, "room name must be 1-63 bytes"));
        }
        if !(crate::protocol::constants::MIN_PLAYERS_PER_ROOM..=crate::protocol::constants::MAX_PLAYERS_PER_ROOM)
            .contains(&max_players)
        {
            return Err(server_err!(ErrorCode::InvalidParams, "max_players must be in 2..=4"));
        }
        if !crate::protocol::constants::is_valid_board_size(board_size) {
            return Err(server_err!(ErrorCode::InvalidParams, "board_size must be an even value in 4..=8"));
        }

        let mut inner = self.inner.lock().expect("room registry mutex poisoned");
        let Some(slot) = inner.slots.iter_mut().find(|s| s.is_none()) else {
            warn!("room registry full, rejecting CREATE_ROOM");
            return Err(server_err!(ErrorCode::RoomLimit, "server is at room capacity"));
        };

        let room_id = inner.next_room_id;
        inner.next_room_id += 1;
        inner.count += 1;

        *slot = Some(Room::new(room_id, name, max_players, board_size, owner));
        self.clients.mutate(owner, |c| {
            c.room_id = Some(room_id);
            c.state = ClientState::InRoom;
        });

        info!(room_id, owner, "room created");
        Ok(room_id)
    }

    pub fn find_by_id(&self, room_id: u32) -> Option<Room> {
        let inner = self.inner.lock().expect("room registry mutex poisoned");
        inner.slots.iter().flatten().find(|r| r.room_id == room_id).cloned()
    }

    /// Run `f` against the live room for `room_id` while the registry lock
    /// is held. `f` must not perform I/O.
    pub fn mutate<R>(&self, room_id: u32, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        let mut inner = self.inner.lock().expect("room registry mutex poisoned");
        inner.slots.iter_mut().flatten().find(|r| r.room_id == room_id).map(f)
    }

    /// Every current room id, for shutdown's final destroy-all sweep.
    pub fn all_room_ids(&self) -> Vec<u32> {
        let inner = self.inner.lock().expect("room registry mutex poisoned");
        inner.slots.iter().flatten().map(|r| r.room_id).collect()
    }

    /// Lobby listing: every non-`FINISHED` room.
    pub fn list_for_lobby(&self) -> Vec<RoomListEntry> {
        let inner = self.inner.lock().expect("room registry mutex poisoned");
        inner
            .slots
            .iter()
            .flatten()
            .filter(|r| r.state != RoomState::Finished)
            .map(|r| RoomListEntry {
                room_id: r.room_id,
                name: r.name.clone(),
                players: r.player_count(),
                max_players: r.max_players,
                state: r.state.as_str(),
                board_size: r.board_size,
            })
            .collect()
    }

    pub fn add_player(&self, room_id: u32, client_id: u32) -> ServerResult<()> {
        let mut inner = self.inner.lock().expect("room registry mutex poisoned");
        let room = inner
            .slots
            .iter_mut()
            .flatten()
            .find(|r| r.room_id == room_id)
            .ok_or_else(|| server_err!(ErrorCode::RoomNotFound, "no such room"))?;
        if room.state != RoomState::Waiting {
            return Err(server_err!(ErrorCode::InvalidMove, "room is not accepting new players"));
        }
        room.add_player(client_id)?;
        self.clients.mutate(client_id, |c| {
            c.room_id = Some(room_id);
            c.state = ClientState::InRoom;
        });
        Ok(())
    }

    /// Send `response` to every current member of `room` while the registry
    /// lock the caller already holds stays held. This is the "locked"
    /// broadcast variant spec.md §5 calls out: it lets cascading operations
    /// (ownership transfer, forfeit, destroy) announce intermediate state
    /// without re-entering the room mutex.
    fn broadcast_locked(&self, room: &Room, response: &ServerResponse, except: Option<u32>) {
        for member in room.member_ids() {
            if Some(member) == except {
                continue;
            }
            self.clients.mutate(member, |c| {
                let _ = c.transport.send(response);
            });
        }
    }

    pub fn broadcast(&self, room_id: u32, response: &ServerResponse) {
        let inner = self.inner.lock().expect("room registry mutex poisoned");
        if let Some(room) = inner.slots.iter().flatten().find(|r| r.room_id == room_id) {
            self.broadcast_locked(room, response, None);
        }
    }

    pub fn broadcast_except(&self, room_id: u32, response: &ServerResponse, excluded: u32) {
        let inner = self.inner.lock().expect("room registry mutex poisoned");
        if let Some(room) = inner.slots.iter().flatten().find(|r| r.room_id == room_id) {
            self.broadcast_locked(room, response, Some(excluded));
        }
    }

    fn destroy_locked(inner: &mut Inner, room_id: u32) {
        if let Some(slot) = inner.slots.iter_mut().find(|s| s.as_ref().is_some_and(|r| r.room_id == room_id)) {
            *slot = None;
            inner.count = inner.count.saturating_sub(1);
        }
    }

    pub fn destroy(&self, room_id: u32) {
        let mut inner = self.inner.lock().expect("room registry mutex poisoned");
        let members = inner
            .slots
            .iter()
            .flatten()
            .find(|r| r.room_id == room_id)
            .map(Room::member_ids)
            .unwrap_or_default();
        for member in members {
            self.clients.mutate(member, |c| {
                c.room_id = None;
                if c.state != ClientState::DisconnectedPending {
                    c.state = ClientState::InLobby;
                }
            });
        }
        Self::destroy_locked(&mut inner, room_id);
        info!(room_id, "room destroyed");
    }

    /// Remove `client_id` from `room_id`, applying the full cascade from
    /// spec.md §4.3:
    ///
    /// 1. If a game is in progress and fewer than two *other* connected
    ///    players remain, forfeit: distribute remaining pairs to the tied
    ///    survivors, broadcast `GAME_END_FORFEIT`, and destroy the room.
    /// 2. Otherwise, if the departing client owned the room, transfer
    ///    ownership to the earliest-seated connected member and announce it.
    /// 3. If the owner left and every remaining member is
    ///    `DisconnectedPending`, destroy the room as a ghost.
    /// 4. If the room is now empty, destroy it.
    pub fn remove_player(&self, room_id: u32, client_id: u32) -> ServerResult<RemovalEffects> {
        let mut inner = self.inner.lock().expect("room registry mutex poisoned");
        let room_idx = inner
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|r| r.room_id == room_id))
            .ok_or_else(|| server_err!(ErrorCode::RoomNotFound, "no such room"))?;

        let mut effects = RemovalEffects::default();

        // --- case 1: forfeit a game that can no longer continue ---
        let is_playing = inner.slots[room_idx].as_ref().unwrap().state == RoomState::Playing;
        if is_playing {
            let others_connected = {
                let room = inner.slots[room_idx].as_ref().unwrap();
                room.other_members(client_id)
                    .into_iter()
                    .filter(|&id| {
                        self.clients
                            .find_by_id(id)
                            .is_some_and(|c| c.state != ClientState::DisconnectedPending)
                    })
                    .count()
            };

            if others_connected < 2 {
                let scores = {
                    let room = inner.slots[room_idx].as_mut().unwrap();
                    let game = room.game.take().expect("room is Playing implies a game exists");
                    self.forfeit_scores(game, client_id)
                };

                let room = inner.slots[room_idx].as_mut().unwrap();
                room.state = RoomState::Finished;
                self.broadcast_locked(
                    room,
                    &ServerResponse::GameEndForfeit { scores: scores.clone() },
                    Some(client_id),
                );

                // survivors return to the lobby; the departing client is
                // excluded (already removed below via the general path).
                for member in room.other_members(client_id) {
                    self.clients.mutate(member, |c| {
                        c.room_id = None;
                        c.state = ClientState::InLobby;
                    });
                }

                Self::destroy_locked(&mut inner, room_id);
                effects.room_destroyed = true;
                effects.forfeit_scores = Some(scores);
                return Ok(effects);
            }

            // game continues with enough players: collapse the departing
            // seat out of the turn order.
            let room = inner.slots[room_idx].as_mut().unwrap();
            if let Some(game) = room.game.as_mut() {
                game.remove_player(client_id);
            }
        }

        let room = inner.slots[room_idx].as_mut().unwrap();
        room.remove_player(client_id);
        let owner_left = room.owner == client_id;

        // --- case 2: ownership transfer ---
        if owner_left {
            if let Some(&successor) = room
                .member_ids()
                .iter()
                .find(|&&id| self.clients.find_by_id(id).is_some_and(|c| c.state != ClientState::DisconnectedPending))
            {
                room.owner = successor;
                self.broadcast_locked(
                    room,
                    &ServerResponse::RoomOwnerChanged { nickname: self.nickname_of(successor) },
                    None,
                );
                effects.new_owner_nickname = Some(self.nickname_of(successor));
            }
        }

        // --- case 3: ghost room (owner left, no connected successor, and
        // every remaining member is disconnected-pending) ---
        let all_remaining_disconnected = !room.member_ids().is_empty()
            && room
                .member_ids()
                .iter()
                .all(|&id| self.clients.find_by_id(id).is_some_and(|c| c.state == ClientState::DisconnectedPending));

        if owner_left && effects.new_owner_nickname.is_none() && all_remaining_disconnected {
            self.broadcast_locked(room, &ServerResponse::RoomClosed { reason: "Owner left".to_string() }, None);
            Self::destroy_locked(&mut inner, room_id);
            effects.room_destroyed = true;
            effects.ghost_room_closed = true;
            return Ok(effects);
        }

        // --- case 4: empty room ---
        if room.player_count() == 0 {
            Self::destroy_locked(&mut inner, room_id);
            effects.room_destroyed = true;
        }

        Ok(effects)
    }

    fn forfeit_scores(&self, game: Game, leaving_client: u32) -> Vec<(String, u32)> {
        let remaining_pairs = game.total_pairs - game.matched_pairs;
        let survivors: Vec<u32> = game.players.iter().copied().filter(|&id| id != leaving_client).collect();

        let mut scores: std::collections::HashMap<u32, u32> = game
            .players
            .iter()
            .zip(game.scores.iter())
            .filter(|(&id, _)| id != leaving_client)
            .map(|(&id, &s)| (id, s))
            .collect();

        if !survivors.is_empty() {
            let max_score = survivors.iter().map(|id| scores[id]).max().unwrap_or(0);
            let tied: Vec<u32> = survivors.iter().copied().filter(|id| scores[id] == max_score).collect();
            let share = remaining_pairs / tied.len() as u32;
            let extra = remaining_pairs % tied.len() as u32;

            // tied survivors in game-seating order; first `extra` of them
            // get the one additional pair that doesn't divide evenly.
            let mut ordered_tied: Vec<u32> = game.players.iter().copied().filter(|id| tied.contains(id)).collect();
            ordered_tied.truncate(extra as usize);

            for &id in &tied {
                *scores.get_mut(&id).unwrap() += share;
            }
            for &id in &ordered_tied {
                *scores.get_mut(&id).unwrap() += 1;
            }
        }

        game.players
            .iter()
            .filter(|&&id| id != leaving_client)
            .map(|&id| (self.nickname_of(id), scores[&id]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Transport;
    use crate::model::client::ClientSession;
    use std::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn registry_with_clients(ids: &[u32]) -> (Arc<ClientRegistry>, Arc<RoomRegistry>) {
        let clients = Arc::new(ClientRegistry::new(16));
        for &id in ids {
            let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
            let mut session = ClientSession::new(id, Transport::new(tx, CancellationToken::new()), Instant::now());
            session.nickname = Some(format!("p{id}"));
            clients.add(session).unwrap();
        }
        let rooms = Arc::new(RoomRegistry::new(8, clients.clone()));
        (clients, rooms)
    }

    #[test]
    fn create_and_list_omits_finished() {
        let (_clients, rooms) = registry_with_clients(&[1]);
        let room_id = rooms.create("lobby".into(), 4, 4, 1).unwrap();
        assert_eq!(rooms.list_for_lobby().len(), 1);
        rooms.mutate(room_id, |r| r.state = RoomState::Finished);
        assert_eq!(rooms.list_for_lobby().len(), 0);
    }

    #[test]
    fn remove_last_player_destroys_room() {
        let (_clients, rooms) = registry_with_clients(&[1]);
        let room_id = rooms.create("lobby".into(), 4, 4, 1).unwrap();
        let effects = rooms.remove_player(room_id, 1).unwrap();
        assert!(effects.room_destroyed);
        assert!(rooms.find_by_id(room_id).is_none());
    }

    #[test]
    fn owner_departure_transfers_to_earliest_connected_member() {
        let (_clients, rooms) = registry_with_clients(&[1, 2]);
        let room_id = rooms.create("lobby".into(), 4, 4, 1).unwrap();
        rooms.add_player(room_id, 2).unwrap();
        let effects = rooms.remove_player(room_id, 1).unwrap();
        assert!(!effects.room_destroyed);
        assert_eq!(effects.new_owner_nickname.as_deref(), Some("p2"));
        assert_eq!(rooms.find_by_id(room_id).unwrap().owner, 2);
    }

    #[test]
    fn forfeit_conserves_total_pairs_among_survivors() {
        let (clients, rooms) = registry_with_clients(&[1, 2, 3]);
        let room_id = rooms.create("lobby".into(), 4, 4, 1).unwrap();
        rooms.add_player(room_id, 2).unwrap();
        rooms.add_player(room_id, 3).unwrap();

        let mut game = Game::create(4, vec![1, 2, 3]).unwrap();
        game.start().unwrap();
        game.scores = vec![1, 2, 2];
        game.matched_pairs = 5;
        rooms.mutate(room_id, |r| {
            r.state = RoomState::Playing;
            r.game = Some(game);
        });
        // mark 2 and 3 disconnected so removing 1 leaves < 2 connected others
        clients.mutate(2, |c| c.state = ClientState::DisconnectedPending);
        clients.mutate(3, |c| c.state = ClientState::DisconnectedPending);

        let effects = rooms.remove_player(room_id, 1).unwrap();
        assert!(effects.room_destroyed);
        let scores = effects.forfeit_scores.unwrap();
        let total: u32 = scores.iter().map(|(_, s)| *s).sum();
        // Survivors 2 and 3 start at 2+2=4 and split remaining_pairs=3
        // (8 total - 5 matched) between them: 4 + 3 = 7. Note §8's
        // "sum(survivors) == matched_pairs + remaining_pairs" invariant only
        // holds when the leaver's own score was 0 — §4.3 distributes
        // *remaining* (unmatched) pairs among survivors, not the leaver's
        // already-scored pairs, so a scoring leaver's points leave the pool.
        assert_eq!(total, 7);
    }
}
