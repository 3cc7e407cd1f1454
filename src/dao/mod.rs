/// Database model definitions.
pub mod models;
/// Persistence backends for users, sessions and leaderboard records.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
