use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Rejection for the upgrade surface. Joining is the only HTTP interaction
/// that can fail here: a connection without usable canvas dimensions is
/// refused with 400 before any player record exists.
#[derive(Debug)]
pub struct BadRequest(pub String);

impl BadRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for BadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": self.0 })),
        )
            .into_response()
    }
}
