use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chat_core::ChatRequest;
use futures_util::StreamExt;
use tracing::{error, warn};

use crate::errors::AppError;
use crate::service::relay_service::RelayService;

/// POST `/chat` — streams the completion for `{ "prompt": ... }` back as
/// chunked plain text.
///
/// Failures before the first fragment become a 500 with a JSON body. A
/// failure after that aborts the body, so the client sees a broken transfer
/// rather than a clean end.
pub async fn chat_handler(
    State(relay): State<RelayService>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected chat request: {rejection}");
            return AppError::InvalidRequest { message: rejection.body_text() }.into_response();
        }
    };

    match relay.open_stream(&request.prompt).await {
        Ok(fragments) => {
            let fragments = fragments.inspect(|item| {
                if let Err(e) = item {
                    error!("Stream failed after output was sent: {e}");
                }
            });
            (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                Body::from_stream(fragments),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}
