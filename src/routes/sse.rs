use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/leaderboard",
    tag = "sse",
    responses((status = 200, description = "Leaderboard SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream best-score improvements and degraded-mode changes.
pub async fn leaderboard_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (receiver, degraded) = sse_service::subscribe_leaderboard(&state);
    info!("New leaderboard SSE connection");
    sse_service::to_sse_stream(receiver, degraded)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/leaderboard", get(leaderboard_stream))
}
