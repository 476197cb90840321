use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::board::{generate_random_board, Board, BoardError, Move};

// Boards are regenerated from scratch this many times before giving up
const MAX_BOARD_ATTEMPTS: u32 = 8;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GameError {
    #[error("incorrect player order")]
    OutOfTurn,
    #[error("hit ({x}, {y}) is out of bounds")]
    OutOfBounds { x: i32, y: i32 },
    #[error("match is already concluded")]
    MatchConcluded,
    #[error("player is not part of this match")]
    PlayerNotInMatch,
    #[error("host and guest boards differ in size")]
    MismatchedBoards,
    #[error("board generation failed: {0}")]
    Board(#[from] BoardError),
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    Host,
    Guest,
}

impl PlayerRole {
    pub fn opponent(self) -> PlayerRole {
        match self {
            PlayerRole::Host => PlayerRole::Guest,
            PlayerRole::Guest => PlayerRole::Host,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    WaitingForHostMove,
    WaitingForGuestMove,
    Concluded,
}

/// Authoritative state of one match: both boards, who opens, and the move log.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    #[serde(rename = "boardHost")]
    board_host: Board,
    #[serde(rename = "boardGuest")]
    board_guest: Board,
    #[serde(rename = "firstPlayer")]
    evens: PlayerRole,
    moves: Vec<Move>,
}

// The per-player projection; only ever carries the viewer's own board
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CensoredView {
    pub board: Board,
    #[serde(rename = "firstPlayer")]
    pub evens: PlayerRole,
    pub moves: Vec<Move>,
}

impl GameState {
    pub fn new(board_host: Board, board_guest: Board, evens: PlayerRole) -> Result<GameState, GameError> {
        let state = GameState { board_host, board_guest, evens, moves: Vec::new() };
        state.validate()?;
        Ok(state)
    }

    /// Two freshly generated boards of one shared random size and a random opener.
    pub fn new_random<R: Rng + ?Sized>(rng: &mut R) -> Result<GameState, GameError> {
        GameState::new_random_with(rng, |rng: &mut R| generate_random_board(rng))
    }

    // `host_board` draws the host's board; the guest's is generated at the same size
    fn new_random_with<R, F>(rng: &mut R, host_board: F) -> Result<GameState, GameError>
    where
        R: Rng + ?Sized,
        F: Fn(&mut R) -> Result<Board, BoardError>,
    {
        let mut last_error = BoardError::PlacementExhausted(0);

        for _ in 0..MAX_BOARD_ATTEMPTS {
            let boards = host_board(rng).and_then(|host| {
                let guest = Board::generate(rng, host.width)?;
                Ok((host, guest))
            });
            match boards {
                Ok((board_host, board_guest)) => {
                    let evens = if rng.gen_bool(0.5) { PlayerRole::Host } else { PlayerRole::Guest };
                    return GameState::new(board_host, board_guest, evens);
                }
                Err(err) => last_error = err,
            }
        }

        Err(GameError::Board(last_error))
    }

    /// Structural checks for a state that did not come from the generator.
    pub fn validate(&self) -> Result<(), GameError> {
        self.board_host.validate()?;
        self.board_guest.validate()?;
        if self.board_host.width != self.board_guest.width || self.board_host.height != self.board_guest.height {
            return Err(GameError::MismatchedBoards);
        }
        Ok(())
    }

    pub fn evens(&self) -> PlayerRole {
        self.evens
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn board(&self, owner: PlayerRole) -> &Board {
        match owner {
            PlayerRole::Host => &self.board_host,
            PlayerRole::Guest => &self.board_guest,
        }
    }

    fn board_mut(&mut self, owner: PlayerRole) -> &mut Board {
        match owner {
            PlayerRole::Host => &mut self.board_host,
            PlayerRole::Guest => &mut self.board_guest,
        }
    }

    /// Who is entitled to the next move, from the parity of the move log.
    pub fn next_to_move(&self) -> PlayerRole {
        if self.moves.len() % 2 == 0 {
            self.evens
        } else {
            self.evens.opponent()
        }
    }

    /// Resolves an attack by `requester` on the opponent's board.
    ///
    /// Returns whether a ship was hit. Turn order and bounds are checked first
    /// and a failure leaves the state untouched. Only the first ship covering
    /// the cell is considered: if it is already dead the attack is a miss, but
    /// it is still logged.
    pub fn try_hit(&mut self, x: i32, y: i32, requester: PlayerRole) -> Result<bool, GameError> {
        if requester != self.next_to_move() {
            return Err(GameError::OutOfTurn);
        }

        let target = self.board_mut(requester.opponent());
        if !target.in_bounds(x, y) {
            return Err(GameError::OutOfBounds { x, y });
        }

        let hit = match target.ship_at_mut(x, y) {
            Some(ship) if ship.alive => {
                ship.alive = false;
                true
            }
            _ => false,
        };

        self.moves.push(Move { x, y, hit });
        Ok(hit)
    }

    pub fn any_ship_alive(&self, owner: PlayerRole) -> bool {
        self.board(owner).any_ship_alive()
    }

    pub fn censored(&self, viewer: PlayerRole) -> CensoredView {
        CensoredView {
            board: self.board(viewer).clone(),
            evens: self.evens,
            moves: self.moves.clone(),
        }
    }
}
