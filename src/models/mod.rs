pub mod board;
pub mod game;
pub mod game_match;
