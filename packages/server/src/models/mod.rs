pub mod config;
pub mod game;
pub mod log;
pub mod player;
pub mod role;
pub mod view;
