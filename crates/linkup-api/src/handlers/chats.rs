//! /chats handlers — chat list, sending, typing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use linkup_core::types::{Chat, MediaType, Message};

use super::{store_error, ApiState};

#[derive(Serialize)]
pub struct ChatsResponse {
    pub chats: Vec<Chat>,
}

pub async fn handle_list(State(state): State<ApiState>) -> Json<ChatsResponse> {
    Json(ChatsResponse {
        chats: state.session.chats(),
    })
}

// ── /chats/send (POST) ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SendRequest {
    pub chat_id: String,
    pub text: String,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub media_type: Option<MediaType>,
}

#[derive(Serialize)]
pub struct SendResponse {
    pub message: Message,
}

pub async fn handle_send(
    State(state): State<ApiState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, (StatusCode, String)> {
    if state.session.store().get_chat(&req.chat_id).is_none() {
        return Err((StatusCode::NOT_FOUND, format!("unknown chat: {}", req.chat_id)));
    }
    let media = match (req.media, req.media_type) {
        (Some(url), Some(kind)) => Some((url, kind)),
        (Some(url), None) => Some((url, MediaType::Image)),
        _ => None,
    };
    let message = state
        .session
        .send_message(&req.chat_id, &req.text, media)
        .map_err(store_error)?;
    Ok(Json(SendResponse { message }))
}

// ── /chats/typing (POST) ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TypingRequest {
    pub chat_id: String,
    pub is_typing: bool,
}

pub async fn handle_typing(
    State(state): State<ApiState>,
    Json(req): Json<TypingRequest>,
) -> StatusCode {
    state.session.set_typing(&req.chat_id, req.is_typing);
    StatusCode::NO_CONTENT
}
