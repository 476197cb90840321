use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::game::{CensoredView, GameError, GameState, PlayerRole, TurnState};

pub type MatchId = Uuid;

// Identity as handed out by the session layer (the token subject)
pub type PlayerIdentity = String;

// Result of one accepted attack
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    pub hit: bool,
    pub win: bool,
}

// Row stored per match for host location and bookkeeping
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct MatchMeta {
    pub match_id: MatchId,
    pub participant_one: PlayerIdentity,
    pub participant_two: PlayerIdentity,
    pub host_address: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct MatchOutcome {
    pub match_id: MatchId,
    pub winner: PlayerIdentity,
    pub loser: PlayerIdentity,
}

/// Full match snapshot exchanged between instances when a match is hydrated.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MatchSnapshot {
    #[serde(rename = "matchID")]
    pub match_id: MatchId,
    pub host: PlayerIdentity,
    pub guest: PlayerIdentity,
    #[serde(rename = "gameState")]
    pub game_state: GameState,
}

#[derive(Debug)]
pub struct Match {
    id: MatchId,
    host: PlayerIdentity,
    guest: PlayerIdentity,
    game: GameState,
    winner: Option<PlayerRole>,
    evicted: bool,
}

impl Match {
    pub fn new(id: MatchId, host: PlayerIdentity, guest: PlayerIdentity, game: GameState) -> Match {
        Match { id, host, guest, game, winner: None, evicted: false }
    }

    /// Rebuilds a match from a snapshot. A snapshot taken after the winning
    /// hit comes back concluded.
    pub fn from_snapshot(snapshot: MatchSnapshot) -> Result<Match, GameError> {
        snapshot.game_state.validate()?;
        let mut game_match = Match::new(snapshot.match_id, snapshot.host, snapshot.guest, snapshot.game_state);
        game_match.winner = decided_winner(&game_match.game);
        Ok(game_match)
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn identity(&self, role: PlayerRole) -> &str {
        match role {
            PlayerRole::Host => &self.host,
            PlayerRole::Guest => &self.guest,
        }
    }

    /// Classifies a validated caller as host or guest of this match.
    pub fn role_of(&self, identity: &str) -> Result<PlayerRole, GameError> {
        if identity == self.host {
            Ok(PlayerRole::Host)
        } else if identity == self.guest {
            Ok(PlayerRole::Guest)
        } else {
            Err(GameError::PlayerNotInMatch)
        }
    }

    pub fn turn_state(&self) -> TurnState {
        match (self.winner, self.game.next_to_move()) {
            (Some(_), _) => TurnState::Concluded,
            (None, PlayerRole::Host) => TurnState::WaitingForHostMove,
            (None, PlayerRole::Guest) => TurnState::WaitingForGuestMove,
        }
    }

    /// Registers an attack and runs the win check on the board just attacked.
    pub fn attack(&mut self, identity: &str, x: i32, y: i32) -> Result<MoveOutcome, GameError> {
        let role = self.role_of(identity)?;
        if self.winner.is_some() {
            return Err(GameError::MatchConcluded);
        }

        let hit = self.game.try_hit(x, y, role)?;
        let win = hit && !self.game.any_ship_alive(role.opponent());
        if win {
            self.winner = Some(role);
        }

        Ok(MoveOutcome { hit, win })
    }

    /// The caller concedes and the opponent is declared winner.
    pub fn forfeit(&mut self, identity: &str) -> Result<PlayerRole, GameError> {
        let role = self.role_of(identity)?;
        if self.winner.is_some() {
            return Err(GameError::MatchConcluded);
        }
        let winner = role.opponent();
        self.winner = Some(winner);
        Ok(winner)
    }

    pub fn censored_for(&self, identity: &str) -> Result<CensoredView, GameError> {
        let role = self.role_of(identity)?;
        Ok(self.game.censored(role))
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.winner.map(|winner| MatchOutcome {
            match_id: self.id,
            winner: self.identity(winner).to_string(),
            loser: self.identity(winner.opponent()).to_string(),
        })
    }

    pub fn meta(&self, host_address: &str) -> MatchMeta {
        MatchMeta {
            match_id: self.id,
            participant_one: self.host.clone(),
            participant_two: self.guest.clone(),
            host_address: host_address.to_string(),
        }
    }

    // Set under the match's write lock right before it leaves the registry
    pub(crate) fn mark_evicted(&mut self) {
        self.evicted = true;
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted
    }
}

// The player whose opponent has a fleet and all of it sunk. The last mover is
// checked first in case both fleets are down.
fn decided_winner(game: &GameState) -> Option<PlayerRole> {
    let sunk = |owner: PlayerRole| {
        let board = game.board(owner);
        !board.ships.is_empty() && !board.any_ship_alive()
    };
    let last_mover = game.next_to_move().opponent();
    [last_mover, last_mover.opponent()].into_iter().find(|role| sunk(role.opponent()))
}
