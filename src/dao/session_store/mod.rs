pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    AchievementEntity, GameSessionEntity, LeaderboardEntity, ProfileChanges, SessionFilter,
    UserAchievementEntity, UserBestScore, UserEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemoryStore;

/// Abstraction over the persistence layer for users, game sessions and leaderboard records.
///
/// Plain reads go straight to the backend. Writes that must stay consistent with each other
/// (forfeit + create, completion + reconciliation, user + leaderboard record) run inside a
/// [`StoreTransaction`] obtained from [`PuzzleStore::begin`].
pub trait PuzzleStore: Send + Sync {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>>;
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn find_users(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;
    /// Apply profile edits to one user document; `None` when the user does not exist.
    fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn find_session(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    fn list_sessions(
        &self,
        filter: SessionFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>>;
    /// Best score per user over the sessions matching `filter`, in
    /// [`UserBestScore::ranking_order`], at most `limit` rows. Users without an account are
    /// skipped.
    fn best_scores(
        &self,
        filter: SessionFilter,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<UserBestScore>>>;
    fn find_leaderboard(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<LeaderboardEntity>>>;
    fn user_achievements(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserAchievementEntity>>>;
    fn find_achievements(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<AchievementEntity>>>;
    /// Users the given user has recorded as friends (outgoing edges).
    fn friend_ids(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Unit of work against the store. Dropping it without calling [`StoreTransaction::commit`]
/// discards every write made through it.
pub trait StoreTransaction: Send {
    /// Take the per-user write lock for the remainder of the transaction.
    ///
    /// Returns `false` when the user does not exist.
    fn lock_user(&mut self, user_id: Uuid) -> BoxFuture<'_, StorageResult<bool>>;
    fn insert_user(&mut self, user: UserEntity) -> BoxFuture<'_, StorageResult<()>>;
    fn find_session(&mut self, id: Uuid)
    -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>>;
    fn list_sessions(
        &mut self,
        filter: SessionFilter,
    ) -> BoxFuture<'_, StorageResult<Vec<GameSessionEntity>>>;
    fn save_session(&mut self, session: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>>;
    fn find_leaderboard(
        &mut self,
        user_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<LeaderboardEntity>>>;
    fn save_leaderboard(&mut self, record: LeaderboardEntity)
    -> BoxFuture<'_, StorageResult<()>>;
    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>>;
}
