//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{AcceptedResponse, ButtonClickRequest, ErrorResponse, SendMessageRequest};
use super::AppState;
use crate::runtime::{SessionError, SessionView};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Current view
        .route("/api/session", get(get_session))
        // User actions
        .route("/api/session/messages", post(send_message))
        .route("/api/session/buttons", post(click_button))
        // SSE streaming
        .route("/api/session/stream", get(stream_session))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.session.view())
}

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    if req.text.is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }
    state.session.send_message(req.text).await?;
    Ok(Json(AcceptedResponse { queued: true }))
}

async fn click_button(
    State(state): State<AppState>,
    Json(req): Json<ButtonClickRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    if req.payload.is_empty() {
        return Err(AppError::BadRequest("Button payload is empty".to_string()));
    }
    state.session.button_click(&req.label, &req.payload).await?;
    Ok(Json(AcceptedResponse { queued: true }))
}

async fn stream_session(State(state): State<AppState>) -> impl IntoResponse {
    sse_stream(state.session.subscribe())
}

async fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Gone(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Gone(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
