use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the puzzle backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::leaderboard_stream,
        crate::routes::users::register_user,
        crate::routes::users::own_profile,
        crate::routes::users::update_profile,
        crate::routes::users::public_profile,
        crate::routes::achievements::list_achievements,
        crate::routes::sessions::list_incomplete,
        crate::routes::sessions::start_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::update_session,
        crate::routes::leaderboard::leaderboard,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::user::RegisterUserRequest,
            crate::dto::user::UpdateProfileRequest,
            crate::dto::user::UserSummary,
            crate::dto::user::ProfileResponse,
            crate::dto::achievement::AchievementResponse,
            crate::dto::session::StartSessionRequest,
            crate::dto::session::UpdateSessionRequest,
            crate::dto::session::SessionResponse,
            crate::dto::leaderboard::LeaderboardEntry,
            crate::dto::sse::BestScoreEvent,
            crate::dto::sse::SystemStatus,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "users", description = "Registration, profiles and achievements"),
        (name = "sessions", description = "Puzzle session lifecycle"),
        (name = "leaderboard", description = "Ranked best scores"),
    )
)]
pub struct ApiDoc;
