use rand::Rng;
use serde::{Deserialize, Serialize};

pub const SHIP_LENGTH: i32 = 3;
pub const SHIPS_PER_BOARD: usize = 3;
pub const MIN_BOARD_SIZE: i32 = 8;
pub const MAX_BOARD_SIZE: i32 = 12;

// Attempts per ship slot before the whole board is given up on
const MAX_PLACEMENT_ATTEMPTS: u32 = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("ship is out of bounds")]
    ShipOutOfBounds,
    #[error("ship geometry does not match its direction")]
    MalformedShip,
    #[error("no valid placement found after {0} attempts")]
    PlacementExhausted(u32),
}

// Axis along which a ship extends from its start cell
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Horizontal,
    Vertical,
}

impl Direction {
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Direction {
        if rng.gen_bool(0.5) {
            Direction::Horizontal
        } else {
            Direction::Vertical
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Ship {
    #[serde(rename = "startx")]
    pub start_x: i32,
    #[serde(rename = "starty")]
    pub start_y: i32,
    #[serde(rename = "endx")]
    pub end_x: i32,
    #[serde(rename = "endy")]
    pub end_y: i32,
    pub direction: Direction,
    pub alive: bool,
}

impl Ship {
    /// Builds a living ship of `length` cells extending from the start cell along `direction`.
    pub fn new(start_x: i32, start_y: i32, direction: Direction, length: i32) -> Ship {
        let (end_x, end_y) = match direction {
            Direction::Horizontal => (start_x + length - 1, start_y),
            Direction::Vertical => (start_x, start_y + length - 1),
        };
        Ship { start_x, start_y, end_x, end_y, direction, alive: true }
    }

    pub fn length(&self) -> i32 {
        match self.direction {
            Direction::Horizontal => self.end_x - self.start_x + 1,
            Direction::Vertical => self.end_y - self.start_y + 1,
        }
    }

    /// Inclusive bounding-box containment. Only exact for ships one cell wide.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.start_x && x <= self.end_x && y >= self.start_y && y <= self.end_y
    }

    fn is_well_formed(&self) -> bool {
        let on_axis = match self.direction {
            Direction::Horizontal => self.end_y == self.start_y,
            Direction::Vertical => self.end_x == self.start_x,
        };
        on_axis && self.length() >= 1
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Board {
    pub width: i32,
    pub height: i32,
    pub ships: Vec<Ship>,
}

// One resolved attack, appended to the match-wide log
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    pub x: i32,
    pub y: i32,
    pub hit: bool,
}

impl Board {
    pub fn new(width: i32, height: i32) -> Board {
        Board { width, height, ships: Vec::new() }
    }

    #[cfg(test)]
    pub fn with_ships(width: i32, height: i32, ships: Vec<Ship>) -> Result<Board, BoardError> {
        let board = Board { width, height, ships };
        board.validate()?;
        Ok(board)
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    pub fn add_ship(&mut self, ship: Ship) -> Result<(), BoardError> {
        if !self.in_bounds(ship.start_x, ship.start_y) || !self.in_bounds(ship.end_x, ship.end_y) {
            return Err(BoardError::ShipOutOfBounds);
        }
        // overlap with existing ships is deliberately not checked
        self.ships.push(ship);
        Ok(())
    }

    /// Checks every ship lies on the board and agrees with its direction.
    pub fn validate(&self) -> Result<(), BoardError> {
        for ship in &self.ships {
            if !ship.is_well_formed() {
                return Err(BoardError::MalformedShip);
            }
            if !self.in_bounds(ship.start_x, ship.start_y) || !self.in_bounds(ship.end_x, ship.end_y) {
                return Err(BoardError::ShipOutOfBounds);
            }
        }
        Ok(())
    }

    /// First ship, in placement order, whose bounding box covers (x, y), dead or alive.
    pub fn ship_at_mut(&mut self, x: i32, y: i32) -> Option<&mut Ship> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.ships.iter_mut().find(|ship| ship.contains(x, y))
    }

    pub fn any_ship_alive(&self) -> bool {
        self.ships.iter().any(|ship| ship.alive)
    }

    /// Places `SHIPS_PER_BOARD` ships of `SHIP_LENGTH` on an empty `dim`x`dim` board.
    ///
    /// A sample that would run off the board is discarded and the same slot is
    /// resampled, up to `MAX_PLACEMENT_ATTEMPTS` times per slot.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, dim: i32) -> Result<Board, BoardError> {
        let mut board = Board::new(dim, dim);

        for _ in 0..SHIPS_PER_BOARD {
            let mut placed = false;
            for _ in 0..MAX_PLACEMENT_ATTEMPTS {
                let start_x = rng.gen_range(0..dim);
                let start_y = rng.gen_range(0..dim);
                let ship = Ship::new(start_x, start_y, Direction::random(rng), SHIP_LENGTH);

                if board.add_ship(ship).is_ok() {
                    placed = true;
                    break;
                }
            }
            if !placed {
                return Err(BoardError::PlacementExhausted(MAX_PLACEMENT_ATTEMPTS));
            }
        }

        Ok(board)
    }
}

pub fn random_board_size<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.gen_range(MIN_BOARD_SIZE..=MAX_BOARD_SIZE)
}

pub fn generate_random_board<R: Rng + ?Sized>(rng: &mut R) -> Result<Board, BoardError> {
    let dim = random_board_size(rng);
    Board::generate(rng, dim)
}
