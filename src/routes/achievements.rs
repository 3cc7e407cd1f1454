use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::achievement::AchievementResponse,
    error::{AppError, ErrorBody},
    identity::UserHandle,
    services::achievement_service,
    state::SharedState,
};

/// Achievement listing for the caller.
pub fn router() -> Router<SharedState> {
    Router::new().route("/achievements", get(list_achievements))
}

#[utoipa::path(
    get,
    path = "/achievements",
    tag = "users",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Achievements held by the caller", body = [AchievementResponse]),
        (status = 401, description = "Missing identity", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn list_achievements(
    State(state): State<SharedState>,
    user: UserHandle,
) -> Result<Json<Vec<AchievementResponse>>, AppError> {
    Ok(Json(achievement_service::list_achievements(&state, user).await?))
}
