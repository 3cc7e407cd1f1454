//! Process-local [`PuzzleStore`] used when no database is configured and by the test suites.
//!
//! Transactions take the single store mutex for their whole lifetime and work on a staged copy
//! of the data, so they are serialized and a dropped transaction leaves no trace.

use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use futures::future::{self, BoxFuture};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::dao::{
    models::{
        AchievementEntity, GameSessionEntity, LeaderboardEntity, ProfileChanges, SessionFilter,
        UserAchievementEntity, UserBestScore, UserEntity,
    },
    session_store::{PuzzleStore, StoreTransaction},
    storage::{StorageError, StorageResult},
};

#[derive(Debug, Clone, Default)]
struct MemoryData {
    users: HashMap<Uuid, UserEntity>,
    sessions: HashMap<Uuid, GameSessionEntity>,
    leaderboards: HashMap<Uuid, LeaderboardEntity>,
    friendships: HashSet<(Uuid, Uuid)>,
    achievements: HashMap<Uuid, AchievementEntity>,
    awards: HashMap<(Uuid, Uuid), UserAchievementEntity>,
}

impl MemoryData {
    fn sessions_matching(&self, filter: &SessionFilter) -> Vec<GameSessionEntity> {
        self.sessions
            .values()
            .filter(|session| filter.matches(session))
            .cloned()
            .collect()
    }

    fn best_scores(&self, filter: &SessionFilter, limit: usize) -> Vec<UserBestScore> {
        let mut best: HashMap<Uuid, u32> = HashMap::new();
        for session in self.sessions.values().filter(|session| filter.matches(session)) {
            best.entry(session.user_id)
                .and_modify(|score| *score = (*score).max(session.score))
                .or_insert(session.score);
        }

        let mut rows: Vec<UserBestScore> = best
            .into_iter()
            .filter_map(|(user_id, score)| {
                self.users.get(&user_id).map(|user| UserBestScore {
                    user_id,
                    username: user.username.clone(),
                    score,
                })
            })
            .collect();
        rows.sort_by(UserBestScore::ranking_order);
        rows.truncate(limit);
        rows
    }

    fn insert_user(&mut self, user: UserEntity) -> StorageResult<()> {
        if self.users.contains_key(&user.id) {
            return Err(StorageError::duplicate(format!(
                "user `{}` already exists",
                user.id
            )));
        }
        if self
            .users
            .values()
            .any(|existing| existing.username == user.username)
        {
            return Err(StorageError::duplicate(format!(
                "username `{}` already taken",
                user.username
            )));
        }
        self.users.insert(user.id, user);
        Ok(())
    }
}

/// In-memory [`PuzzleStore`] implementation.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
    online: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            data: Arc::default(),
            online: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directed friendship edge, standing in for the friendship service.
    pub async fn add_friendship(&self, from_user: Uuid, to_user: Uuid) {
        self.data.lock().await.friendships.insert((from_user, to_user));
    }

    /// Define an achievement, standing in for the admin tooling.
    pub async fn add_achievement(&self, achievement: AchievementEntity) {
        self.data
            .lock()
            .await
            .achievements
            .insert(achievement.id, achievement);
    }

    /// Award an achievement to a user, standing in for the admin tooling.
    pub async fn award_achievement(
        &self,
        user_id: Uuid,
        achievement_id: Uuid,
        awarded_at: SystemTime,
    ) -> StorageResult<()> {
        let mut data = self.data.lock().await;
        if data.awards.contains_key(&(user_id, achievement_id)) {
            return Err(StorageError::duplicate(format!(
                "achievement `{achievement_id}` already awarded to `{user_id}`"
            )));
        }
        data.awards.insert(
            (user_id, achievement_id),
            UserAchievementEntity {
                user_id,
                achievement_id,
                awarded_at,
            },
        );
        Ok(())
    }

    /// Make health checks and reconnects fail (or succeed again), emulating a lost database.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn reachability(&self) -> StorageResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable(
                "in-memory store marked offline".into(),
                io::Error::from(io::ErrorKind::NotConnected),
            ))
        }
    }
}

impl PuzzleStore for MemoryStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>> {
        let data = self.data.clone();
        Box::pin(async move {
            let guard = data.lock_owned().await;
            let staged = guard.clone();
            Ok(Box::new(MemoryTransaction { guard, staged }) as Box<dyn StoreTransaction>)
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let data = self.data.clone();
        Box::pin(async move { Ok(data.lock().await.users.get(&id).cloned()) })
    }

    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let data = self.data.clone();
        Box::pin(async move {
            let guard = data.lock().await;
            Ok(guard
                .users
                .values()
                .find(|user| user.username == username)
                .cloned())
        })
    }

    fn find_users(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let data = self.data.clone();
        Box::pin(async move {
            let guard = data.lock().await;
            Ok(ids
                .iter()
                .filter_map(|id| guard.users.get(id).cloned())
                .collect())
        })
    }

    fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let data = self.data.clone();
        Box::pin(async move {
            let mut guard = data.lock().await;
            Ok(guard.users.get_mut(&user_id).map(|user| {
                changes.apply(user);
                user.clone()
            }))
        })
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let data = self.data.clone();
        Box::pin(async move { Ok(data.lock().await.sessions.get(&id).cloned()) })
    }

    fn list_sessions(
        &self,
        filter: SessionFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let data = self.data.clone();
        Box::pin(async move { Ok(data.lock().await.sessions_matching(&filter)) })
    }

    fn find_leaderboard(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<LeaderboardEntity>>> {
        let data = self.data.clone();
        Box::pin(async move { Ok(data.lock().await.leaderboards.get(&user_id).cloned()) })
    }

    fn best_scores(
        &self,
        filter: SessionFilter,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<UserBestScore>>> {
        let data = self.data.clone();
        Box::pin(async move { Ok(data.lock().await.best_scores(&filter, limit)) })
    }

    fn user_achievements(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserAchievementEntity>>> {
        let data = self.data.clone();
        Box::pin(async move {
            let guard = data.lock().await;
            Ok(guard
                .awards
                .values()
                .filter(|award| award.user_id == user_id)
                .cloned()
                .collect())
        })
    }

    fn find_achievements(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<AchievementEntity>>> {
        let data = self.data.clone();
        Box::pin(async move {
            let guard = data.lock().await;
            Ok(ids
                .iter()
                .filter_map(|id| guard.achievements.get(id).cloned())
                .collect())
        })
    }

    fn friend_ids(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let data = self.data.clone();
        Box::pin(async move {
            let guard = data.lock().await;
            Ok(guard
                .friendships
                .iter()
                .filter(|(from, _)| *from == user_id)
                .map(|(_, to)| *to)
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(self.reachability()))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(self.reachability()))
    }
}

/// Transaction over the in-memory store.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryData>,
    staged: MemoryData,
}

impl StoreTransaction for MemoryTransaction {
    fn lock_user(&mut self, user_id: Uuid) -> BoxFuture<'_, StorageResult<bool>> {
        // The store mutex is already held; only existence needs checking.
        Box::pin(future::ready(Ok(self.staged.users.contains_key(&user_id))))
    }

    fn insert_user(&mut self, user: UserEntity) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(future::ready(self.staged.insert_user(user)))
    }

    fn find_session(
        &mut self,
        id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        Box::pin(future::ready(Ok(self.staged.sessions.get(&id).cloned())))
    }

    fn list_sessions(
        &mut self,
        filter: SessionFilter,
    ) -> BoxFuture<'_, StorageResult<Vec<GameSessionEntity>>> {
        Box::pin(future::ready(Ok(self.staged.sessions_matching(&filter))))
    }

    fn save_session(&mut self, session: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.staged.sessions.insert(session.id, session);
        Box::pin(future::ready(Ok(())))
    }

    fn find_leaderboard(
        &mut self,
        user_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<LeaderboardEntity>>> {
        Box::pin(future::ready(Ok(self
            .staged
            .leaderboards
            .get(&user_id)
            .cloned())))
    }

    fn save_leaderboard(
        &mut self,
        record: LeaderboardEntity,
    ) -> BoxFuture<'_, StorageResult<()>> {
        self.staged.leaderboards.insert(record.user_id, record);
        Box::pin(future::ready(Ok(())))
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Box::pin(future::ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn user(name: &str) -> UserEntity {
        UserEntity::new(name.into(), None, SystemTime::UNIX_EPOCH)
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = MemoryStore::new();
        let alice = user("alice");

        let mut txn = store.begin().await.unwrap();
        txn.insert_user(alice.clone()).await.unwrap();
        drop(txn);

        assert!(store.find_user(alice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = MemoryStore::new();
        let alice = user("alice");

        let mut txn = store.begin().await.unwrap();
        txn.insert_user(alice.clone()).await.unwrap();
        txn.save_leaderboard(LeaderboardEntity::empty(alice.id, SystemTime::UNIX_EPOCH))
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert_eq!(store.find_user(alice.id).await.unwrap(), Some(alice.clone()));
        assert!(store.find_leaderboard(alice.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = MemoryStore::new();

        let mut txn = store.begin().await.unwrap();
        txn.insert_user(user("alice")).await.unwrap();
        let err = txn.insert_user(user("alice")).await.unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn friend_ids_follow_outgoing_edges() {
        let store = MemoryStore::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.add_friendship(a, b).await;
        store.add_friendship(c, a).await;

        assert_eq!(store.friend_ids(a).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn best_scores_group_join_and_cap() {
        let store = MemoryStore::new();
        let (ann, bob, ghost) = (user("ann"), user("bob"), Uuid::new_v4());

        let mut txn = store.begin().await.unwrap();
        txn.insert_user(ann.clone()).await.unwrap();
        txn.insert_user(bob.clone()).await.unwrap();
        for (owner, score) in [(ann.id, 40), (ann.id, 70), (bob.id, 70), (ghost, 99)] {
            txn.save_session(GameSessionEntity {
                id: Uuid::new_v4(),
                user_id: owner,
                difficulty: 3,
                game_state: json!({}),
                score,
                time_played: Some(Duration::from_secs(1)),
                completed: true,
                created_at: SystemTime::UNIX_EPOCH,
                updated_at: SystemTime::UNIX_EPOCH,
                completed_at: Some(SystemTime::UNIX_EPOCH),
            })
            .await
            .unwrap();
        }
        txn.commit().await.unwrap();

        let rows = store
            .best_scores(SessionFilter::default().completed(true), 50)
            .await
            .unwrap();
        let summary: Vec<_> = rows
            .iter()
            .map(|row| (row.username.as_str(), row.score))
            .collect();
        assert_eq!(summary, vec![("ann", 70), ("bob", 70)]);

        let capped = store
            .best_scores(SessionFilter::default(), 1)
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn profile_update_is_applied_in_place() {
        let store = MemoryStore::new();
        let ann = user("ann");
        let mut txn = store.begin().await.unwrap();
        txn.insert_user(ann.clone()).await.unwrap();
        txn.commit().await.unwrap();

        let changes = ProfileChanges {
            bio: Some("sliding tiles".into()),
            ..ProfileChanges::default()
        };
        let updated = store.update_profile(ann.id, changes.clone()).await.unwrap();
        assert_eq!(updated.map(|user| user.bio), Some("sliding tiles".to_owned()));
        assert!(
            store
                .update_profile(Uuid::new_v4(), changes)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn offline_store_fails_health_checks() {
        let store = MemoryStore::new();
        assert!(store.health_check().await.is_ok());

        store.set_online(false);
        assert!(store.health_check().await.is_err());
        assert!(store.try_reconnect().await.is_err());

        store.set_online(true);
        assert!(store.try_reconnect().await.is_ok());
    }
}
