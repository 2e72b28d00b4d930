pub mod api;
pub mod config;
pub mod draw;
pub mod error;
pub mod game_flow;
pub mod guess;
pub mod lobby;
pub mod registry;
pub mod room;
pub mod state;
pub mod timer;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};

use config::ServerConfig;
use state::AppState;

/// Build the axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router, AppState) {
    let state = AppState::new(config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/rooms-available", get(api::rooms_available))
        .route("/ws/{room_id}", get(ws::ws_handler))
        .layer(cors)
        .with_state(state.clone());

    (app, state)
}
