use std::sync::Arc;

use crate::services::clock::{Clock, SystemClock};
use crate::services::game_service::GameService;
use crate::services::repository::{GameRepository, InMemoryGameRepository};

#[derive(Clone)]
pub struct AppState {
    pub game_service: Arc<GameService>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_backends(Arc::new(InMemoryGameRepository::new()), Arc::new(SystemClock))
    }

    /// Builds the state on an explicit store and clock.
    pub fn with_backends(repository: Arc<dyn GameRepository>, clock: Arc<dyn Clock>) -> Self {
        AppState {
            game_service: Arc::new(GameService::new(repository, clock)),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
