//! /status handler — session overview.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use linkup_services::LinkState;

use super::ApiState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub user_id: String,
    pub address: String,
    /// True when running on a fallback address (canonical address was
    /// claimed by another session of the same account).
    pub degraded: bool,
    pub links: Vec<LinkJson>,
    pub chats: usize,
    pub posts: usize,
}

#[derive(Serialize)]
pub struct LinkJson {
    pub peer_id: String,
    pub state: String,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let links = state
        .session
        .links()
        .into_iter()
        .map(|l| LinkJson {
            peer_id: l.peer_id,
            state: match l.state {
                LinkState::Dialing => "dialing".to_string(),
                LinkState::Open => "open".to_string(),
                LinkState::Closed => "closed".to_string(),
            },
        })
        .collect();

    Json(StatusResponse {
        user_id: state.session.user_id().to_string(),
        address: state.session.address().to_string(),
        degraded: state.session.is_degraded(),
        links,
        chats: state.session.chats().len(),
        posts: state.session.store().get_all_posts().len(),
    })
}
