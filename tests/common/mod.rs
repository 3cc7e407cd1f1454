#![allow(dead_code)]

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, SystemTime},
};

use futures::future::BoxFuture;
use puzzle_back::{
    clock::ManualClock,
    config::AppConfig,
    dao::{
        models::{
            AchievementEntity, GameSessionEntity, LeaderboardEntity, ProfileChanges,
            SessionFilter, UserAchievementEntity, UserBestScore, UserEntity,
        },
        session_store::{MemoryStore, PuzzleStore, StoreTransaction},
        storage::{StorageError, StorageResult},
    },
    dto::session::SessionResponse,
    identity::UserHandle,
    services::{session_service, user_service},
    state::{AppState, SharedState, session_lifecycle::SessionPatch},
};
use serde_json::json;
use uuid::Uuid;

/// 2024-03-01T00:00:00Z
pub const MARCH_FIRST: u64 = 1_709_251_200;
pub const DAY: Duration = Duration::from_secs(86_400);

pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

pub struct Harness {
    pub state: SharedState,
    pub clock: Arc<ManualClock>,
    pub store: MemoryStore,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let store = MemoryStore::new();
        Self::with_store(config, store.clone(), Arc::new(store)).await
    }

    /// Install `installed` while keeping `store` around for direct inspection.
    pub async fn with_store(
        config: AppConfig,
        store: MemoryStore,
        installed: Arc<dyn PuzzleStore>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(at(MARCH_FIRST + 12 * 3_600)));
        let state = AppState::with_clock(config, clock.clone());
        state.set_store(installed).await;
        Self {
            state,
            clock,
            store,
        }
    }

    pub async fn register(&self, username: &str) -> UserHandle {
        let user = user_service::register_user(&self.state, username.to_owned(), None)
            .await
            .expect("registration succeeds");
        UserHandle::new(user.id)
    }

    pub async fn start(&self, user: UserHandle, difficulty: i64) -> SessionResponse {
        session_service::start_session(&self.state, user, difficulty, json!({"tiles": []}))
            .await
            .expect("session starts")
    }

    /// Start a session, play it for ten seconds and complete it with `score`.
    pub async fn play(&self, user: UserHandle, difficulty: i64, score: i64) -> SessionResponse {
        let session = self.start(user, difficulty).await;
        self.clock.advance(Duration::from_secs(10));
        session_service::update_session(
            &self.state,
            user,
            session.id,
            SessionPatch {
                score: Some(score),
                completed: Some(true),
                ..SessionPatch::default()
            },
        )
        .await
        .expect("session completes")
    }

    pub async fn sessions_of(&self, user: UserHandle) -> Vec<GameSessionEntity> {
        self.store
            .list_sessions(SessionFilter::owned_by(user.id))
            .await
            .unwrap()
    }
}

/// Store whose transactions fail every leaderboard write once armed.
pub struct FailingLeaderboardStore {
    pub inner: MemoryStore,
    pub armed: Arc<AtomicBool>,
}

impl PuzzleStore for FailingLeaderboardStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>> {
        let begin = self.inner.begin();
        let armed = self.armed.clone();
        Box::pin(async move {
            let inner = begin.await?;
            Ok(Box::new(FailingLeaderboardTransaction { inner, armed }) as Box<dyn StoreTransaction>)
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        self.inner.find_user(id)
    }

    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        self.inner.find_user_by_username(username)
    }

    fn find_users(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        self.inner.find_users(ids)
    }

    fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        self.inner.update_profile(user_id, changes)
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        self.inner.find_session(id)
    }

    fn list_sessions(
        &self,
        filter: SessionFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        self.inner.list_sessions(filter)
    }

    fn best_scores(
        &self,
        filter: SessionFilter,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<UserBestScore>>> {
        self.inner.best_scores(filter, limit)
    }

    fn find_leaderboard(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<LeaderboardEntity>>> {
        self.inner.find_leaderboard(user_id)
    }

    fn user_achievements(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserAchievementEntity>>> {
        self.inner.user_achievements(user_id)
    }

    fn find_achievements(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<AchievementEntity>>> {
        self.inner.find_achievements(ids)
    }

    fn friend_ids(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        self.inner.friend_ids(user_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

struct FailingLeaderboardTransaction {
    inner: Box<dyn StoreTransaction>,
    armed: Arc<AtomicBool>,
}

impl StoreTransaction for FailingLeaderboardTransaction {
    fn lock_user(&mut self, user_id: Uuid) -> BoxFuture<'_, StorageResult<bool>> {
        self.inner.lock_user(user_id)
    }

    fn insert_user(&mut self, user: UserEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.inner.insert_user(user)
    }

    fn find_session(
        &mut self,
        id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        self.inner.find_session(id)
    }

    fn list_sessions(
        &mut self,
        filter: SessionFilter,
    ) -> BoxFuture<'_, StorageResult<Vec<GameSessionEntity>>> {
        self.inner.list_sessions(filter)
    }

    fn save_session(&mut self, session: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.inner.save_session(session)
    }

    fn find_leaderboard(
        &mut self,
        user_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<LeaderboardEntity>>> {
        self.inner.find_leaderboard(user_id)
    }

    fn save_leaderboard(
        &mut self,
        record: LeaderboardEntity,
    ) -> BoxFuture<'_, StorageResult<()>> {
        if !self.armed.load(Ordering::SeqCst) {
            return self.inner.save_leaderboard(record);
        }
        Box::pin(async {
            Err(StorageError::unavailable(
                "leaderboard write rejected".into(),
                io::Error::other("injected failure"),
            ))
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.commit()
    }
}
