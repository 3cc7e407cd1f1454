use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dao::models::ProfileChanges,
    dto::user::{ProfileResponse, RegisterUserRequest, UpdateProfileRequest, UserSummary},
    error::{AppError, ErrorBody},
    identity::UserHandle,
    services::user_service,
    state::SharedState,
};

/// Registration and profile endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users", post(register_user))
        .route("/profile", get(own_profile).patch(update_profile))
        .route("/profile/{username}", get(public_profile))
}

/// Register a new player.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User registered", body = UserSummary),
        (status = 400, description = "Invalid or taken username", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserSummary>), AppError> {
    payload.validate()?;
    let user = user_service::register_user(&state, payload.username, payload.email).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Profile of the calling user.
#[utoipa::path(
    get,
    path = "/profile",
    tag = "users",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    responses(
        (status = 200, description = "Caller profile", body = ProfileResponse),
        (status = 401, description = "Missing identity", body = ErrorBody)
    )
)]
pub async fn own_profile(
    State(state): State<SharedState>,
    user: UserHandle,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(user_service::profile(&state, user).await?))
}

/// Edit bio, birth date or email of the calling user. `null` clears a field.
#[utoipa::path(
    patch,
    path = "/profile",
    tag = "users",
    params(("X-User-Id" = String, Header, description = "Authenticated user id")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid profile field", body = ErrorBody),
        (status = 401, description = "Missing identity", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn update_profile(
    State(state): State<SharedState>,
    user: UserHandle,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    payload.validate()?;
    let changes = ProfileChanges::try_from(payload)?;
    Ok(Json(user_service::update_profile(&state, user, changes).await?))
}

/// Public profile of any player.
#[utoipa::path(
    get,
    path = "/profile/{username}",
    tag = "users",
    params(("username" = String, Path, description = "Username to look up")),
    responses(
        (status = 200, description = "Public profile", body = ProfileResponse),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn public_profile(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(user_service::public_profile(&state, username).await?))
}
