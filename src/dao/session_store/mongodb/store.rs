use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel,
    bson::doc,
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        ACHIEVEMENT_COLLECTION_NAME, FRIENDSHIP_COLLECTION_NAME, LEADERBOARD_COLLECTION_NAME,
        MongoAchievementDocument, MongoBestScoreDocument, MongoFriendshipDocument,
        MongoLeaderboardDocument, MongoSessionDocument, MongoUserAchievementDocument,
        MongoUserDocument, SESSION_COLLECTION_NAME, USER_ACHIEVEMENT_COLLECTION_NAME,
        USER_COLLECTION_NAME, best_scores_pipeline, bson_uuid, doc_id, profile_update,
        session_query, uuid_list,
    },
};
use crate::dao::{
    models::{
        AchievementEntity, GameSessionEntity, LeaderboardEntity, ProfileChanges, SessionFilter,
        UserAchievementEntity, UserBestScore, UserEntity,
    },
    session_store::{PuzzleStore, StoreTransaction},
    storage::StorageResult,
};

/// MongoDB-backed [`PuzzleStore`]. Transactions need a replica set or sharded cluster.
#[derive(Clone)]
pub struct MongoPuzzleStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoPuzzleStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let username_index = IndexModel::builder()
            .keys(doc! {"username": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("user_username_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        database
            .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
            .create_index(username_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: USER_COLLECTION_NAME,
                index: "username",
                source,
            })?;

        let sessions = database.collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME);
        let owner_index = IndexModel::builder()
            .keys(doc! {"user_id": 1, "completed": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_owner_idx".to_owned()))
                    .build(),
            )
            .build();
        sessions
            .create_index(owner_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "user_id,completed",
                source,
            })?;

        // Leaderboard queries scan completed sessions by difficulty and completion date.
        let ranking_index = IndexModel::builder()
            .keys(doc! {"completed": 1, "difficulty": 1, "completed_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_ranking_idx".to_owned()))
                    .build(),
            )
            .build();
        sessions
            .create_index(ranking_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION_NAME,
                index: "completed,difficulty,completed_at",
                source,
            })?;

        let friendship_index = IndexModel::builder()
            .keys(doc! {"from_user": 1, "to_user": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("friendship_edge_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        database
            .collection::<MongoFriendshipDocument>(FRIENDSHIP_COLLECTION_NAME)
            .create_index(friendship_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: FRIENDSHIP_COLLECTION_NAME,
                index: "from_user,to_user",
                source,
            })?;

        let award_index = IndexModel::builder()
            .keys(doc! {"user_id": 1, "achievement_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("user_achievement_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        database
            .collection::<MongoUserAchievementDocument>(USER_ACHIEVEMENT_COLLECTION_NAME)
            .create_index(award_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: USER_ACHIEVEMENT_COLLECTION_NAME,
                index: "user_id,achievement_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn users(&self) -> Collection<MongoUserDocument> {
        self.database()
            .await
            .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        self.database()
            .await
            .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
    }

    async fn begin_transaction(&self) -> MongoResult<MongoTransaction> {
        let (client, database) = {
            let guard = self.inner.state.read().await;
            (guard.client.clone(), guard.database.clone())
        };

        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::StartTransaction { source })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::StartTransaction { source })?;

        Ok(MongoTransaction { session, database })
    }

    async fn find_user(&self, id: Uuid) -> MongoResult<Option<UserEntity>> {
        let document = self
            .users()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?;
        Ok(document.map(Into::into))
    }

    async fn find_user_by_username(&self, username: String) -> MongoResult<Option<UserEntity>> {
        let document = self
            .users()
            .await
            .find_one(doc! {"username": username})
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?;
        Ok(document.map(Into::into))
    }

    async fn find_users(&self, ids: Vec<Uuid>) -> MongoResult<Vec<UserEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<MongoUserDocument> = self
            .users()
            .await
            .find(doc! {"_id": {"$in": uuid_list(&ids)}})
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadUsers { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> MongoResult<Option<UserEntity>> {
        let users = self.users().await;
        let document = if changes.is_empty() {
            users.find_one(doc_id(id)).await
        } else {
            users
                .find_one_and_update(doc_id(id), profile_update(&changes))
                .return_document(ReturnDocument::After)
                .await
        }
        .map_err(|source| MongoDaoError::UpdateProfile { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn find_session(&self, id: Uuid) -> MongoResult<Option<GameSessionEntity>> {
        self.sessions()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?
            .map(GameSessionEntity::try_from)
            .transpose()
    }

    async fn list_sessions(&self, filter: SessionFilter) -> MongoResult<Vec<GameSessionEntity>> {
        let documents: Vec<MongoSessionDocument> = self
            .sessions()
            .await
            .find(session_query(&filter))
            .await
            .map_err(|source| MongoDaoError::ListSessions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListSessions { source })?;

        documents
            .into_iter()
            .map(GameSessionEntity::try_from)
            .collect()
    }

    async fn best_scores(
        &self,
        filter: SessionFilter,
        limit: usize,
    ) -> MongoResult<Vec<UserBestScore>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let documents: Vec<MongoBestScoreDocument> = self
            .sessions()
            .await
            .aggregate(best_scores_pipeline(&filter, limit))
            .with_type::<MongoBestScoreDocument>()
            .await
            .map_err(|source| MongoDaoError::BestScores { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::BestScores { source })?;

        documents
            .into_iter()
            .map(UserBestScore::try_from)
            .collect()
    }

    async fn user_achievements(&self, user_id: Uuid) -> MongoResult<Vec<UserAchievementEntity>> {
        let documents: Vec<MongoUserAchievementDocument> = self
            .database()
            .await
            .collection::<MongoUserAchievementDocument>(USER_ACHIEVEMENT_COLLECTION_NAME)
            .find(doc! {"user_id": bson_uuid(user_id)})
            .await
            .map_err(|source| MongoDaoError::LoadAchievements { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadAchievements { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_achievements(&self, ids: Vec<Uuid>) -> MongoResult<Vec<AchievementEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<MongoAchievementDocument> = self
            .database()
            .await
            .collection::<MongoAchievementDocument>(ACHIEVEMENT_COLLECTION_NAME)
            .find(doc! {"_id": {"$in": uuid_list(&ids)}})
            .await
            .map_err(|source| MongoDaoError::LoadAchievements { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadAchievements { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_leaderboard(&self, user_id: Uuid) -> MongoResult<Option<LeaderboardEntity>> {
        self.database()
            .await
            .collection::<MongoLeaderboardDocument>(LEADERBOARD_COLLECTION_NAME)
            .find_one(doc_id(user_id))
            .await
            .map_err(|source| MongoDaoError::LoadLeaderboard { user_id, source })?
            .map(LeaderboardEntity::try_from)
            .transpose()
    }

    async fn friend_ids(&self, user_id: Uuid) -> MongoResult<Vec<Uuid>> {
        let documents: Vec<MongoFriendshipDocument> = self
            .database()
            .await
            .collection::<MongoFriendshipDocument>(FRIENDSHIP_COLLECTION_NAME)
            .find(doc! {"from_user": bson_uuid(user_id)})
            .await
            .map_err(|source| MongoDaoError::ListFriends { user_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListFriends { user_id, source })?;

        Ok(documents
            .iter()
            .map(MongoFriendshipDocument::friend_id)
            .collect())
    }
}

impl PuzzleStore for MongoPuzzleStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>> {
        let store = self.clone();
        Box::pin(async move {
            let transaction = store.begin_transaction().await?;
            Ok(Box::new(transaction) as Box<dyn StoreTransaction>)
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user(id).await.map_err(Into::into) })
    }

    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_user_by_username(username)
                .await
                .map_err(Into::into)
        })
    }

    fn find_users(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_users(ids).await.map_err(Into::into) })
    }

    fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_profile(user_id, changes)
                .await
                .map_err(Into::into)
        })
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
    }

    fn list_sessions(
        &self,
        filter: SessionFilter,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_sessions(filter).await.map_err(Into::into) })
    }

    fn find_leaderboard(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<LeaderboardEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_leaderboard(user_id).await.map_err(Into::into) })
    }

    fn best_scores(
        &self,
        filter: SessionFilter,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<UserBestScore>>> {
        let store = self.clone();
        Box::pin(async move { store.best_scores(filter, limit).await.map_err(Into::into) })
    }

    fn user_achievements(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserAchievementEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.user_achievements(user_id).await.map_err(Into::into) })
    }

    fn find_achievements(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<AchievementEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_achievements(ids).await.map_err(Into::into) })
    }

    fn friend_ids(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { store.friend_ids(user_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

/// Multi-document transaction bound to a MongoDB client session.
///
/// Dropping the session while the transaction is in progress aborts it on the server.
pub struct MongoTransaction {
    session: ClientSession,
    database: Database,
}

impl StoreTransaction for MongoTransaction {
    fn lock_user(&mut self, user_id: Uuid) -> BoxFuture<'_, StorageResult<bool>> {
        Box::pin(async move {
            let result = self
                .database
                .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
                .update_one(doc_id(user_id), doc! {"$inc": {"lock_version": 1}})
                .session(&mut self.session)
                .await
                .map_err(|source| MongoDaoError::LockUser {
                    id: user_id,
                    source,
                })?;
            Ok(result.matched_count > 0)
        })
    }

    fn insert_user(&mut self, user: UserEntity) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let id = user.id;
            let document: MongoUserDocument = user.into();
            self.database
                .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
                .insert_one(&document)
                .session(&mut self.session)
                .await
                .map_err(|source| MongoDaoError::SaveUser { id, source })?;
            Ok(())
        })
    }

    fn find_session(
        &mut self,
        id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        Box::pin(async move {
            let document = self
                .database
                .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
                .find_one(doc_id(id))
                .session(&mut self.session)
                .await
                .map_err(|source| MongoDaoError::LoadSession { id, source })?;
            Ok(document.map(GameSessionEntity::try_from).transpose()?)
        })
    }

    fn list_sessions(
        &mut self,
        filter: SessionFilter,
    ) -> BoxFuture<'_, StorageResult<Vec<GameSessionEntity>>> {
        Box::pin(async move {
            let mut cursor = self
                .database
                .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
                .find(session_query(&filter))
                .session(&mut self.session)
                .await
                .map_err(|source| MongoDaoError::ListSessions { source })?;
            let documents: Vec<MongoSessionDocument> = cursor
                .stream(&mut self.session)
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::ListSessions { source })?;

            let sessions = documents
                .into_iter()
                .map(GameSessionEntity::try_from)
                .collect::<MongoResult<Vec<_>>>()?;
            Ok(sessions)
        })
    }

    fn save_session(&mut self, session: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let id = session.id;
            let document: MongoSessionDocument = session.into();
            self.database
                .collection::<MongoSessionDocument>(SESSION_COLLECTION_NAME)
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .session(&mut self.session)
                .await
                .map_err(|source| MongoDaoError::SaveSession { id, source })?;
            Ok(())
        })
    }

    fn find_leaderboard(
        &mut self,
        user_id: Uuid,
    ) -> BoxFuture<'_, StorageResult<Option<LeaderboardEntity>>> {
        Box::pin(async move {
            let document = self
                .database
                .collection::<MongoLeaderboardDocument>(LEADERBOARD_COLLECTION_NAME)
                .find_one(doc_id(user_id))
                .session(&mut self.session)
                .await
                .map_err(|source| MongoDaoError::LoadLeaderboard { user_id, source })?;
            Ok(document.map(LeaderboardEntity::try_from).transpose()?)
        })
    }

    fn save_leaderboard(
        &mut self,
        record: LeaderboardEntity,
    ) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let user_id = record.user_id;
            let document: MongoLeaderboardDocument = record.into();
            self.database
                .collection::<MongoLeaderboardDocument>(LEADERBOARD_COLLECTION_NAME)
                .replace_one(doc_id(user_id), &document)
                .upsert(true)
                .session(&mut self.session)
                .await
                .map_err(|source| MongoDaoError::SaveLeaderboard { user_id, source })?;
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        let mut transaction = *self;
        Box::pin(async move {
            transaction
                .session
                .commit_transaction()
                .await
                .map_err(|source| MongoDaoError::CommitTransaction { source })?;
            Ok(())
        })
    }
}
