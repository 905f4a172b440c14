pub mod chat_routes;

use axum::Router;
use axum::routing::post;

use crate::service::relay_service::RelayService;
use chat_routes::chat_handler;

pub fn router(relay: RelayService) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .with_state(relay)
}
