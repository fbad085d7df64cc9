use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{server_err, ServerResult};
use crate::protocol::error_codes::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Hidden,
    Revealed,
    Matched,
}

#[derive(Debug, Clone, Copy)]
pub struct Card {
    pub value: u32,
    pub state: CardState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Waiting,
    Playing,
    Finished,
}

/// Outcome of `check_match`, telling the session handler what to broadcast.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched { scorer: u32, new_score: u32, finished: bool },
    Mismatched { next_player: u32 },
}

/// The Pexeso board and turn state for a single room's game, grounded on
/// the original engine's `game_create`/`game_flip_card`/`game_check_match`
/// state machine. Owned exclusively by the `Room` that created it; all
/// mutation happens through the room registry's locked operations (see
/// spec.md §5).
#[derive(Debug, Clone)]
pub struct Game {
    pub board_size: u8,
    pub total_cards: usize,
    pub total_pairs: u32,
    pub cards: Vec<Card>,

    pub current_player_index: usize,
    pub first_card_index: Option<usize>,
    pub second_card_index: Option<usize>,
    pub flips_this_turn: u8,

    /// Snapshot of client ids in seating order, taken at game creation.
    pub players: Vec<u32>,
    pub ready: Vec<bool>,
    pub scores: Vec<u32>,

    pub matched_pairs: u32,
    pub state: GameState,
}

impl Game {
    /// Build a fresh, shuffled board for `players` (in seating order).
    /// `rng` is injectable so tests get deterministic boards; production
    /// code draws from the thread-local generator via `Game::create`.
    pub fn create_with_rng<R: Rng + ?Sized>(board_size: u8, players: Vec<u32>, rng: &mut R) -> ServerResult<Self> {
        if !crate::protocol::constants::is_valid_board_size(board_size) {
            return Err(server_err!(ErrorCode::InvalidParams, "board_size must be an even value in 4..=8"));
        }
        if players.is_empty() {
            return Err(server_err!(ErrorCode::NeedMorePlayers, "a game needs at least one player"));
        }

        let total_cards = board_size as usize * board_size as usize;
        let total_pairs = total_cards as u32 / 2;

        let mut values: Vec<u32> = (1..=total_pairs).chain(1..=total_pairs).collect();
        values.shuffle(rng);

        let cards = values
            .into_iter()
            .map(|value| Card { value, state: CardState::Hidden })
            .collect();

        let player_count = players.len();
        Ok(Self {
            board_size,
            total_cards,
            total_pairs,
            cards,
            current_player_index: 0,
            first_card_index: None,
            second_card_index: None,
            flips_this_turn: 0,
            players,
            ready: vec![false; player_count],
            scores: vec![0; player_count],
            matched_pairs: 0,
            state: GameState::Waiting,
        })
    }

    pub fn create(board_size: u8, players: Vec<u32>) -> ServerResult<Self> {
        let mut rng = rand::rng();
        Self::create_with_rng(board_size, players, &mut rng)
    }

    fn index_of(&self, client_id: u32) -> Option<usize> {
        self.players.iter().position(|&id| id == client_id)
    }

    pub fn player_ready(&mut self, client_id: u32) -> ServerResult<()> {
        if self.state != GameState::Waiting {
            return Err(server_err!(ErrorCode::InvalidMove, "game is not waiting for ready"));
        }
        let idx = self
            .index_of(client_id)
            .ok_or_else(|| server_err!(ErrorCode::NotInRoom, "client is not part of this game"))?;
        self.ready[idx] = true;
        Ok(())
    }

    pub fn all_players_ready(&self) -> bool {
        !self.ready.is_empty() && self.ready.iter().all(|&r| r)
    }

    pub fn start(&mut self) -> ServerResult<()> {
        if self.state != GameState::Waiting {
            return Err(server_err!(ErrorCode::InvalidMove, "game already started"));
        }
        self.state = GameState::Playing;
        self.current_player_index = 0;
        Ok(())
    }

    pub fn current_player(&self) -> Option<u32> {
        if self.state != GameState::Playing {
            return None;
        }
        self.players.get(self.current_player_index).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.state == GameState::Finished
    }

    pub fn flip_card(&mut self, client_id: u32, index: usize) -> ServerResult<u32> {
        if self.state != GameState::Playing {
            return Err(server_err!(ErrorCode::GameNotStarted, "game is not in progress"));
        }
        if self.current_player() != Some(client_id) {
            return Err(server_err!(ErrorCode::NotYourTurn, "it is not your turn"));
        }
        if self.flips_this_turn >= 2 {
            return Err(server_err!(ErrorCode::InvalidMove, "both cards already flipped this turn"));
        }
        let card = self
            .cards
            .get_mut(index)
            .ok_or_else(|| server_err!(ErrorCode::InvalidCard, "card index out of range"))?;
        if card.state != CardState::Hidden {
            return Err(server_err!(ErrorCode::InvalidCard, "card is not hidden"));
        }

        card.state = CardState::Revealed;
        let value = card.value;

        if self.first_card_index.is_none() {
            self.first_card_index = Some(index);
        } else {
            self.second_card_index = Some(index);
        }
        self.flips_this_turn += 1;

        Ok(value)
    }

    /// Resolve the two flipped cards. Only meaningful once `flips_this_turn
    /// == 2`; callers (the session handler) invoke this right after the
    /// second `flip_card` succeeds.
    pub fn check_match(&mut self) -> ServerResult<MatchOutcome> {
        if self.flips_this_turn != 2 {
            return Err(server_err!(ErrorCode::InvalidMove, "check_match called before two cards were flipped"));
        }
        let first = self.first_card_index.expect("flips_this_turn == 2 implies first_card_index is set");
        let second = self.second_card_index.expect("flips_this_turn == 2 implies second_card_index is set");

        let is_match = self.cards[first].value == self.cards[second].value;

        self.first_card_index = None;
        self.second_card_index = None;
        self.flips_this_turn = 0;

        if is_match {
            self.cards[first].state = CardState::Matched;
            self.cards[second].state = CardState::Matched;
            self.scores[self.current_player_index] += 1;
            self.matched_pairs += 1;

            let scorer = self.players[self.current_player_index];
            let new_score = self.scores[self.current_player_index];

            if self.matched_pairs == self.total_pairs {
                self.state = GameState::Finished;
            }

            Ok(MatchOutcome::Matched { scorer, new_score, finished: self.is_finished() })
        } else {
            self.cards[first].state = CardState::Hidden;
            self.cards[second].state = CardState::Hidden;
            self.current_player_index = (self.current_player_index + 1) % self.players.len();

            Ok(MatchOutcome::Mismatched { next_player: self.players[self.current_player_index] })
        }
    }

    /// Every player tied at the maximum score, in seating order.
    pub fn get_winners(&self) -> Vec<u32> {
        let Some(&max_score) = self.scores.iter().max() else {
            return Vec::new();
        };
        self.players
            .iter()
            .zip(self.scores.iter())
            .filter(|(_, &score)| score == max_score)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Drop a player from a mid-play game (see spec.md §4.6/§4.3). Rebinds
    /// the turn cursor so the player who would have gone next after the
    /// departing occupant's turn is preserved.
    pub fn remove_player(&mut self, client_id: u32) {
        let Some(idx) = self.index_of(client_id) else {
            return;
        };

        let was_current = idx == self.current_player_index;
        self.players.remove(idx);
        self.ready.remove(idx);
        self.scores.remove(idx);

        if self.players.is_empty() {
            self.current_player_index = 0;
            return;
        }

        if was_current {
            // The departing occupant's turn is abandoned; hand play to
            // whoever now occupies this index (the player who used to sit
            // just after them), wrapping if they were last.
            self.current_player_index %= self.players.len();
            self.first_card_index = None;
            self.second_card_index = None;
            self.flips_this_turn = 0;
        } else if idx < self.current_player_index {
            self.current_player_index -= 1;
        }
    }

    /// `(nickname, score)` pairs, index-aligned by the caller against
    /// `players`/`scores` — never by incidental iteration order of a
    /// separately sorted winners list. See spec.md §9's score-printing
    /// resolution.
    pub fn scored_pairs<'a>(&self, nickname_of: impl Fn(u32) -> &'a str) -> Vec<(String, u32)> {
        self.players
            .iter()
            .zip(self.scores.iter())
            .map(|(&id, &score)| (nickname_of(id).to_string(), score))
            .collect()
    }

    /// Board slots for `GAME_STATE`: the value if `MATCHED`, else `0`.
    pub fn visible_slots(&self) -> Vec<u32> {
        self.cards
            .iter()
            .map(|c| if c.state == CardState::Matched { c.value } else { 0 })
            .collect()
    }
}
