pub mod config;
pub mod game;
pub mod grid;
pub mod neighborhood;
pub mod server;
pub mod snake;
