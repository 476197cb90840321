pub mod game;
pub mod internal;
