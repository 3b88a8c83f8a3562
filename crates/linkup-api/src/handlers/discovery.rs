//! /discovery and /swipe handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use linkup_core::types::{now_ms, PeerIdentity, User};
use linkup_services::SearchOutcome;

use super::{store_error, ApiState};

#[derive(Serialize)]
pub struct DiscoveryResponse {
    pub candidates: Vec<CandidateJson>,
}

#[derive(Serialize)]
pub struct CandidateJson {
    pub id: String,
    pub profile: User,
    pub last_seen_secs: u64,
    pub transport_address: String,
}

fn candidate(identity: PeerIdentity) -> CandidateJson {
    CandidateJson {
        last_seen_secs: now_ms().saturating_sub(identity.last_seen) / 1000,
        id: identity.id,
        profile: identity.profile,
        transport_address: identity.transport_address,
    }
}

pub async fn handle_discovery(State(state): State<ApiState>) -> Json<DiscoveryResponse> {
    let candidates = state
        .session
        .discovery_candidates()
        .await
        .into_iter()
        .map(candidate)
        .collect();
    Json(DiscoveryResponse { candidates })
}

// ── /discovery/search (POST) ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// `found: false` is a real outcome ("no such user"), distinct from a
/// transport-level failure (which surfaces as an empty discovery list and
/// a retry on the client's cadence).
#[derive(Serialize)]
pub struct SearchResponse {
    pub found: bool,
    pub peer: Option<CandidateJson>,
}

pub async fn handle_search(
    State(state): State<ApiState>,
    Json(req): Json<SearchRequest>,
) -> Json<SearchResponse> {
    match state.session.search(&req.query).await {
        SearchOutcome::Found(identity) => Json(SearchResponse {
            found: true,
            peer: Some(candidate(*identity)),
        }),
        SearchOutcome::NotFound => Json(SearchResponse {
            found: false,
            peer: None,
        }),
    }
}

// ── /swipe (POST) ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SwipeRequest {
    pub user_id: String,
    pub direction: SwipeDirection,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
}

#[derive(Serialize)]
pub struct SwipeResponse {
    /// Present on a right swipe: the chat created (or found) for the match.
    pub chat_id: Option<String>,
}

pub async fn handle_swipe(
    State(state): State<ApiState>,
    Json(req): Json<SwipeRequest>,
) -> Result<Json<SwipeResponse>, (StatusCode, String)> {
    match req.direction {
        // left swipe advances the client's cursor; nothing happens here
        SwipeDirection::Left => Ok(Json(SwipeResponse { chat_id: None })),
        SwipeDirection::Right => {
            let target = state
                .session
                .store()
                .get_user_by_id(&req.user_id)
                .ok_or((StatusCode::NOT_FOUND, format!("unknown user: {}", req.user_id)))?;
            let chat_id = state.session.swipe_right(&target).map_err(store_error)?;
            Ok(Json(SwipeResponse {
                chat_id: Some(chat_id),
            }))
        }
    }
}
