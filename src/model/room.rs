use crate::error::{server_err, ServerResult};
use crate::model::game::Game;
use crate::protocol::error_codes::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Waiting,
    Playing,
    Finished,
}

impl RoomState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Playing => "PLAYING",
            Self::Finished => "FINISHED",
        }
    }
}

/// A room's membership, configuration, and (once started) its game.
///
/// Invariants: `player_count()` equals the number of occupied slots;
/// `owner`, when set, always references a current member; an empty room is
/// destroyed by the caller (see `registry::room_registry`).
#[derive(Debug, Clone)]
pub struct Room {
    pub room_id: u32,
    pub name: String,
    pub max_players: u8,
    pub board_size: u8,
    pub players: [Option<u32>; 4],
    pub owner: u32,
    pub state: RoomState,
    pub game: Option<Game>,
}

impl Room {
    pub fn new(room_id: u32, name: String, max_players: u8, board_size: u8, owner: u32) -> Self {
        let mut players = [None; 4];
        players[0] = Some(owner);
        Self {
            room_id,
            name,
            max_players,
            board_size,
            players,
            owner,
            state: RoomState::Waiting,
            game: None,
        }
    }

    pub fn player_count(&self) -> u8 {
        self.players.iter().filter(|p| p.is_some()).count() as u8
    }

    pub fn is_member(&self, client_id: u32) -> bool {
        self.players.iter().any(|p| *p == Some(client_id))
    }

    /// Ordered ids of current members (seating order, skipping empty slots).
    pub fn member_ids(&self) -> Vec<u32> {
        self.players.iter().filter_map(|p| *p).collect()
    }

    pub fn add_player(&mut self, client_id: u32) -> ServerResult<()> {
        if self.is_member(client_id) {
            return Err(server_err!(ErrorCode::AlreadyInRoom, "already a member of this room"));
        }
        if self.player_count() >= self.max_players {
            return Err(server_err!(ErrorCode::RoomFull, "room is at capacity"));
        }
        let slot = self
            .players
            .iter_mut()
            .find(|p| p.is_none())
            .expect("player_count < max_players implies a free slot exists");
        *slot = Some(client_id);
        Ok(())
    }

    /// Clear every slot referencing `client_id`. Returns how many slots
    /// matched (should be exactly one; more than one is a bug the caller
    /// logs and treats as repaired, per spec.md's defensive-repair policy).
    pub fn remove_player(&mut self, client_id: u32) -> usize {
        let mut removed = 0;
        for slot in &mut self.players {
            if *slot == Some(client_id) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    /// Earliest-seated member that is not `client_id`, used both to find an
    /// ownership successor and, in the forfeit path, the seating-ordered
    /// survivor list.
    pub fn other_members(&self, exclude: u32) -> Vec<u32> {
        self.players
            .iter()
            .filter_map(|p| *p)
            .filter(|&id| id != exclude)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_room_seats_owner_in_first_slot() {
        let room = Room::new(1, "lobby".into(), 4, 4, 7);
        assert_eq!(room.player_count(), 1);
        assert!(room.is_member(7));
        assert_eq!(room.owner, 7);
    }

    #[test]
    fn add_player_rejects_duplicates_and_overflow() {
        let mut room = Room::new(1, "lobby".into(), 2, 4, 1);
        room.add_player(2).unwrap();
        assert_eq!(room.add_player(2).unwrap_err().code, ErrorCode::AlreadyInRoom);
        assert_eq!(room.add_player(3).unwrap_err().code, ErrorCode::RoomFull);
    }

    #[test]
    fn remove_player_clears_every_matching_slot() {
        let mut room = Room::new(1, "lobby".into(), 4, 4, 1);
        room.players[2] = Some(1); // simulate an injected duplicate
        assert_eq!(room.remove_player(1), 2);
        assert_eq!(room.player_count(), 0);
    }
}
