use anyhow::Context;
use axum::http::{self, HeaderValue, Method};
use chrono::Duration as ChronoDuration;
use dotenvy::dotenv;
use env_logger::Builder;
use log::LevelFilter;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use werewolf_server::{app, state::AppState, utils::config::CONFIG};

/// Debug by default; `RUST_LOG` overrides.
fn init_logger() {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Debug)
        .filter_module("tower_http", LevelFilter::Debug)
        .filter_module("axum", LevelFilter::Debug)
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .format_target(true)
        .parse_default_env()
        .init();
}

/// Fires due phase timers across all games.
fn spawn_ticker(state: AppState) {
    let interval = CONFIG.tick_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let fired = state.game_service.tick_all().await;
            if fired > 0 {
                log::debug!("{} phase timer(s) fired", fired);
            }
        }
    });
}

/// Drops games nobody has touched for the idle timeout.
fn spawn_reaper(state: AppState) -> anyhow::Result<()> {
    let interval = CONFIG.reap_interval;
    let max_idle = ChronoDuration::from_std(CONFIG.idle_timeout).context("idle timeout out of range")?;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match state.game_service.reap_idle_games(max_idle).await {
                Ok(reaped) if !reaped.is_empty() => log::info!("reaped idle games {:?}", reaped),
                Ok(_) => {}
                Err(e) => log::warn!("reaper failed: {}", e),
            }
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv() {
        eprintln!("Warning: could not load .env: {}", e);
    }

    init_logger();

    let origin = CONFIG
        .allowed_origin
        .parse::<HeaderValue>()
        .context("WEREWOLF_ALLOWED_ORIGIN is not a valid origin")?;
    let cors = CorsLayer::new()
        .allow_origin([origin])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([http::header::CONTENT_TYPE]);

    let state = AppState::new();
    spawn_ticker(state.clone());
    spawn_reaper(state.clone())?;

    let app = app::create_app_with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
                tracing::info_span!(
                    "HTTP request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        );

    let addr = CONFIG.bind_addr;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    log::info!("werewolf server listening on http://{}", addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
