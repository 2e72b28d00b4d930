use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::state::AppState;

/// Response shape of the room-discovery endpoint.
#[derive(Debug, Serialize)]
pub struct RoomsAvailableResponse {
    pub status_code: u16,
    pub data: String,
}

/// `GET /rooms-available`: the id of a room in the lobby with a free slot,
/// or 404 when none exists.
pub async fn rooms_available(State(state): State<AppState>) -> impl IntoResponse {
    match state
        .registry
        .joinable_room(state.config.game.max_players)
        .await
    {
        Some(room_id) => (
            StatusCode::OK,
            Json(RoomsAvailableResponse {
                status_code: StatusCode::OK.as_u16(),
                data: room_id,
            }),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(RoomsAvailableResponse {
                status_code: StatusCode::NOT_FOUND.as_u16(),
                data: "No joinable rooms available".to_string(),
            }),
        ),
    }
}

/// `GET /health`.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
