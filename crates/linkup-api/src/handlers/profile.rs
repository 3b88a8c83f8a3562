//! /profile and /snapshot handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use linkup_core::types::User;

use super::{store_error, ApiState};

pub async fn handle_get(
    State(state): State<ApiState>,
) -> Result<Json<User>, (StatusCode, String)> {
    state
        .session
        .store()
        .get_user_by_id(state.session.user_id())
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "profile missing".to_string()))
}

pub async fn handle_update(
    State(state): State<ApiState>,
    Json(user): Json<User>,
) -> Result<StatusCode, (StatusCode, String)> {
    if user.id != state.session.user_id() {
        return Err((
            StatusCode::FORBIDDEN,
            "can only update the session's own profile".to_string(),
        ));
    }
    state.session.update_profile(&user).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Assistant-backed helpers ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RewriteBioRequest {
    pub bio: String,
}

#[derive(Serialize)]
pub struct RewriteBioResponse {
    pub bio: String,
}

pub async fn handle_rewrite_bio(
    State(state): State<ApiState>,
    Json(req): Json<RewriteBioRequest>,
) -> Json<RewriteBioResponse> {
    Json(RewriteBioResponse {
        bio: state.session.rewrite_bio(&req.bio).await,
    })
}

#[derive(Deserialize)]
pub struct IcebreakerRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct IcebreakerResponse {
    pub text: String,
}

pub async fn handle_icebreaker(
    State(state): State<ApiState>,
    Json(req): Json<IcebreakerRequest>,
) -> Json<IcebreakerResponse> {
    Json(IcebreakerResponse {
        text: state.session.suggest_icebreaker(&req.name).await,
    })
}

// ── Snapshots ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ExportResponse {
    pub snapshot: String,
}

pub async fn handle_export(State(state): State<ApiState>) -> Json<ExportResponse> {
    Json(ExportResponse {
        snapshot: state.session.export_snapshot(),
    })
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub snapshot: String,
}

pub async fn handle_import(
    State(state): State<ApiState>,
    Json(req): Json<ImportRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.session.import_snapshot(&req.snapshot) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::BAD_REQUEST, "snapshot did not parse".to_string()))
    }
}
