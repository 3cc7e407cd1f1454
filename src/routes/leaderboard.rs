use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::leaderboard::{LeaderboardEntry, LeaderboardQuery},
    error::{AppError, ErrorBody},
    identity::UserHandle,
    services::leaderboard_service,
    state::SharedState,
};

/// Ranked leaderboard endpoint.
pub fn router() -> Router<SharedState> {
    Router::new().route("/leaderboard", get(leaderboard))
}

/// Best completed score per player, highest first, computed live from session history.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "leaderboard",
    params(
        LeaderboardQuery,
        ("X-User-Id" = Option<String>, Header, description = "Caller id, required for friends_only")
    ),
    responses(
        (status = 200, description = "Ranked rows", body = [LeaderboardEntry]),
        (status = 400, description = "Invalid filters", body = ErrorBody),
        (status = 401, description = "friends_only without a caller", body = ErrorBody)
    )
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    caller: Option<UserHandle>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let rows = leaderboard_service::query(&state, caller, &query).await?;
    Ok(Json(rows))
}
