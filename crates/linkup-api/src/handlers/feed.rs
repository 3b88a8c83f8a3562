//! /feed handlers — the shared post feed.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use linkup_core::types::Post;

use super::{store_error, ApiState};

#[derive(Serialize)]
pub struct FeedResponse {
    pub posts: Vec<Post>,
}

pub async fn handle_feed(State(state): State<ApiState>) -> Json<FeedResponse> {
    Json(FeedResponse {
        posts: state.session.feed().await,
    })
}

// ── /feed/publish (POST) ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PublishRequest {
    pub media: Vec<String>,
    #[serde(default)]
    pub is_video: Vec<bool>,
}

#[derive(Serialize)]
pub struct PublishResponse {
    pub post: Post,
}

pub async fn handle_publish(
    State(state): State<ApiState>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, (StatusCode, String)> {
    if req.media.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "a post needs media".to_string()));
    }
    let post = state
        .session
        .publish_post(req.media, req.is_video)
        .await
        .map_err(store_error)?;
    Ok(Json(PublishResponse { post }))
}

// ── /feed/like (POST) ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LikeRequest {
    pub post_id: String,
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
}

pub async fn handle_like(
    State(state): State<ApiState>,
    Json(req): Json<LikeRequest>,
) -> Result<Json<LikeResponse>, (StatusCode, String)> {
    let liked = state.session.like_post(&req.post_id).map_err(store_error)?;
    Ok(Json(LikeResponse { liked }))
}

// ── /feed/comment (POST) ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CommentRequest {
    pub post_id: String,
    pub text: String,
}

pub async fn handle_comment(
    State(state): State<ApiState>,
    Json(req): Json<CommentRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .session
        .comment_on_post(&req.post_id, &req.text)
        .map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}
