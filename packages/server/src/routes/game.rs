use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::models::{
    config::GameConfig,
    game::{GameAction, GameId},
    player::PlayerId,
};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub game_id: GameId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigureRequest {
    pub player_id: PlayerId,
    pub token: u64,
    pub settings: GameConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionRequest {
    pub player_id: PlayerId,
    pub token: u64,
    pub action: GameAction,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: u64,
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = match &self {
            GameError::Validation(_) | GameError::IllegalAction(_) | GameError::Configuration(_) => {
                StatusCode::BAD_REQUEST
            }
            GameError::Unauthorized => StatusCode::UNAUTHORIZED,
            GameError::GameNotFound(_) | GameError::PlayerNotFound(_) => StatusCode::NOT_FOUND,
            GameError::GameFull | GameError::GameAlreadyStarted | GameError::GameFinished => {
                StatusCode::CONFLICT
            }
            GameError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        } else {
            log::debug!("request rejected: {}", self);
        }

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/create", post(create_game))
        .nest(
            "/:game_id",
            Router::new()
                .route("/join", post(join_game))
                .route("/config", put(configure_game))
                .route("/actions", post(submit_action))
                .route("/state", get(get_game_state))
                .route("/players/:player_id/log", get(get_private_log)),
        )
        .with_state(state)
}

pub async fn create_game(
    State(state): State<AppState>,
    settings: Option<Json<GameConfig>>,
) -> Result<impl IntoResponse, GameError> {
    let settings = settings.map(|Json(s)| s).unwrap_or_default();
    let game_id = state.game_service.create_game(settings).await?;
    Ok((StatusCode::CREATED, Json(CreateGameResponse { game_id })))
}

pub async fn join_game(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
    Json(req): Json<JoinRequest>,
) -> Result<impl IntoResponse, GameError> {
    let joined = state.game_service.join_game(game_id, &req.name).await?;
    Ok(Json(joined))
}

pub async fn configure_game(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
    Json(req): Json<ConfigureRequest>,
) -> Result<impl IntoResponse, GameError> {
    let service = &state.game_service;
    service.authenticate(game_id, req.player_id, req.token).await?;
    let view = service
        .configure_game(game_id, req.player_id, req.settings)
        .await?;
    Ok(Json(view))
}

pub async fn submit_action(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
    Json(req): Json<ActionRequest>,
) -> Result<impl IntoResponse, GameError> {
    let service = &state.game_service;
    service.authenticate(game_id, req.player_id, req.token).await?;
    let view = service
        .submit_action(game_id, req.player_id, req.action)
        .await?;
    Ok(Json(view))
}

pub async fn get_game_state(
    State(state): State<AppState>,
    Path(game_id): Path<GameId>,
) -> Result<impl IntoResponse, GameError> {
    let view = state.game_service.get_state(game_id).await?;
    Ok(Json(view))
}

pub async fn get_private_log(
    State(state): State<AppState>,
    Path((game_id, player_id)): Path<(GameId, PlayerId)>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, GameError> {
    let service = &state.game_service;
    service.authenticate(game_id, player_id, query.token).await?;
    let entries = service.get_private_log(game_id, player_id).await?;
    Ok(Json(entries))
}
