pub mod clock;
pub mod game_service;
pub mod night;
pub mod phase;
pub mod repository;
pub mod role_assignment;
pub mod victory;
pub mod voting;
