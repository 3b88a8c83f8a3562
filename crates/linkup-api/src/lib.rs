pub mod handlers;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::status::handle_status))
        .route("/discovery", get(handlers::discovery::handle_discovery))
        .route("/discovery/search", post(handlers::discovery::handle_search))
        .route("/swipe", post(handlers::discovery::handle_swipe))
        .route("/chats", get(handlers::chats::handle_list))
        .route("/chats/send", post(handlers::chats::handle_send))
        .route("/chats/typing", post(handlers::chats::handle_typing))
        .route("/feed", get(handlers::feed::handle_feed))
        .route("/feed/publish", post(handlers::feed::handle_publish))
        .route("/feed/like", post(handlers::feed::handle_like))
        .route("/feed/comment", post(handlers::feed::handle_comment))
        .route("/profile", get(handlers::profile::handle_get))
        .route("/profile", put(handlers::profile::handle_update))
        .route("/profile/rewrite-bio", post(handlers::profile::handle_rewrite_bio))
        .route("/profile/icebreaker", post(handlers::profile::handle_icebreaker))
        .route("/snapshot", get(handlers::profile::handle_export))
        .route("/snapshot", post(handlers::profile::handle_import))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "API listening on 127.0.0.1");
    axum::serve(listener, app).await?;
    Ok(())
}
