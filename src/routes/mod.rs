use axum::Router;

use crate::state::SharedState;

pub mod achievements;
pub mod docs;
pub mod health;
pub mod leaderboard;
pub mod sessions;
pub mod sse;
pub mod users;

/// Compose every resource router with the documentation routes and bind the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(users::router())
        .merge(achievements::router())
        .merge(sessions::router())
        .merge(leaderboard::router());

    api_router.merge(docs::router()).with_state(state)
}
