/// Achievements held by users.
pub mod achievement_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Best-score reconciliation and ranked queries.
pub mod leaderboard_service;
/// Puzzle session lifecycle.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Background storage connection supervisor.
pub mod storage_supervisor;
/// User registration and profiles.
pub mod user_service;
