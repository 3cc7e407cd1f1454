use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::session::{SessionResponse, StartSessionRequest, UpdateSessionRequest},
    error::{AppError, ErrorBody},
    identity::UserHandle,
    services::session_service,
    state::SharedState,
};

/// Session lifecycle endpoints; every route requires an identified caller.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", get(list_incomplete).post(start_session))
        .route("/sessions/{id}", get(get_session).patch(update_session))
}

/// Sessions of the caller that are still in progress, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses((status = 200, description = "Unfinished sessions", body = [SessionResponse]))
)]
pub async fn list_incomplete(
    State(state): State<SharedState>,
    user: UserHandle,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    Ok(Json(session_service::list_incomplete(&state, user).await?))
}

/// Start a session, forfeiting the caller's unfinished one.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = SessionResponse),
        (status = 400, description = "Invalid difficulty or game state", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    user: UserHandle,
    Json(payload): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    payload.validate()?;
    let session =
        session_service::start_session(&state, user, payload.difficulty, payload.game_state)
            .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("id" = Uuid, Path, description = "Session identifier")
    ),
    responses(
        (status = 200, description = "Session", body = SessionResponse),
        (status = 404, description = "Unknown session or owned by someone else", body = ErrorBody)
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    user: UserHandle,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(session_service::get_session(&state, user, id).await?))
}

/// Update a session; `completed: true` finishes it and updates the leaderboard.
#[utoipa::path(
    patch,
    path = "/sessions/{id}",
    tag = "sessions",
    params(
        ("X-User-Id" = String, Header, description = "Authenticated user id"),
        ("id" = Uuid, Path, description = "Session identifier")
    ),
    request_body = UpdateSessionRequest,
    responses(
        (status = 200, description = "Updated session", body = SessionResponse),
        (status = 400, description = "Invalid update", body = ErrorBody),
        (status = 404, description = "Unknown session or owned by someone else", body = ErrorBody)
    )
)]
pub async fn update_session(
    State(state): State<SharedState>,
    user: UserHandle,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    payload.validate()?;
    let session = session_service::update_session(&state, user, id, payload.into()).await?;
    Ok(Json(session))
}
