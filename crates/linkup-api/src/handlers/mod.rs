//! HTTP API handlers — exposes session state as JSON.

pub mod chats;
pub mod discovery;
pub mod feed;
pub mod profile;
pub mod status;

use axum::http::StatusCode;

use linkup_services::SessionController;

#[derive(Clone)]
pub struct ApiState {
    pub session: SessionController,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Map a store failure onto a 500 — persistence errors are surfaced,
/// never silently swallowed.
pub(crate) fn store_error(e: linkup_services::StoreError) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
