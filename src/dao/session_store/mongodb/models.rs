use std::time::Duration;

use mongodb::bson::{self, Bson, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    AchievementEntity, GameSessionEntity, LeaderboardEntity, ProfileChanges, SessionFilter,
    UserAchievementEntity, UserBestScore, UserEntity,
};

pub const USER_COLLECTION_NAME: &str = "users";
pub const SESSION_COLLECTION_NAME: &str = "game_sessions";
pub const LEADERBOARD_COLLECTION_NAME: &str = "leaderboards";
pub const FRIENDSHIP_COLLECTION_NAME: &str = "friendships";
pub const ACHIEVEMENT_COLLECTION_NAME: &str = "achievements";
pub const USER_ACHIEVEMENT_COLLECTION_NAME: &str = "user_achievements";

pub fn bson_uuid(id: Uuid) -> bson::Uuid {
    bson::Uuid::from_bytes(id.into_bytes())
}

fn from_bson_uuid(id: bson::Uuid) -> Uuid {
    Uuid::from_bytes(id.bytes())
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": bson_uuid(id)}
}

/// Calendar dates are stored as UTC midnight.
fn date_to_bson(date: Date) -> DateTime {
    DateTime::from_system_time(date.midnight().assume_utc().into())
}

fn date_from_bson(value: DateTime) -> Date {
    OffsetDateTime::from(value.to_system_time()).date()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    date_of_birth: Option<DateTime>,
    created_at: DateTime,
    /// Bumped by every lifecycle transaction of the user to force write conflicts.
    #[serde(default)]
    lock_version: i64,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: bson_uuid(value.id),
            username: value.username,
            email: value.email,
            bio: value.bio,
            date_of_birth: value.date_of_birth.map(date_to_bson),
            created_at: DateTime::from_system_time(value.created_at),
            lock_version: 0,
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            username: value.username,
            email: value.email,
            bio: value.bio,
            date_of_birth: value.date_of_birth.map(date_from_bson),
            created_at: value.created_at.to_system_time(),
        }
    }
}

/// `$set` document for a profile edit; cleared fields are stored as null.
pub fn profile_update(changes: &ProfileChanges) -> Document {
    let mut set = Document::new();
    if let Some(bio) = &changes.bio {
        set.insert("bio", bio.as_str());
    }
    if let Some(date_of_birth) = changes.date_of_birth {
        set.insert(
            "date_of_birth",
            date_of_birth.map_or(Bson::Null, |date| Bson::DateTime(date_to_bson(date))),
        );
    }
    if let Some(email) = &changes.email {
        set.insert(
            "email",
            email
                .as_deref()
                .map_or(Bson::Null, |email| Bson::String(email.to_owned())),
        );
    }
    doc! {"$set": set}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    user_id: bson::Uuid,
    difficulty: i32,
    game_state: serde_json::Value,
    score: i64,
    time_played_ms: Option<i64>,
    #[serde(default)]
    completed: bool,
    created_at: DateTime,
    updated_at: DateTime,
    completed_at: Option<DateTime>,
}

impl From<GameSessionEntity> for MongoSessionDocument {
    fn from(value: GameSessionEntity) -> Self {
        Self {
            id: bson_uuid(value.id),
            user_id: bson_uuid(value.user_id),
            difficulty: i32::from(value.difficulty),
            game_state: value.game_state,
            score: i64::from(value.score),
            time_played_ms: value
                .time_played
                .map(|played| i64::try_from(played.as_millis()).unwrap_or(i64::MAX)),
            completed: value.completed,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<MongoSessionDocument> for GameSessionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSessionDocument) -> Result<Self, Self::Error> {
        let invalid = |reason: String| MongoDaoError::InvalidDocument {
            collection: SESSION_COLLECTION_NAME,
            reason,
        };

        let difficulty = u8::try_from(value.difficulty)
            .map_err(|_| invalid(format!("difficulty {} out of range", value.difficulty)))?;
        let score = u32::try_from(value.score)
            .map_err(|_| invalid(format!("score {} out of range", value.score)))?;
        let time_played = value
            .time_played_ms
            .map(|ms| {
                u64::try_from(ms)
                    .map(Duration::from_millis)
                    .map_err(|_| invalid(format!("negative play time {ms}")))
            })
            .transpose()?;

        Ok(Self {
            id: from_bson_uuid(value.id),
            user_id: from_bson_uuid(value.user_id),
            difficulty,
            game_state: value.game_state,
            score,
            time_played,
            completed: value.completed,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
            completed_at: value.completed_at.map(|at| at.to_system_time()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLeaderboardDocument {
    #[serde(rename = "_id")]
    user_id: bson::Uuid,
    best_score: i64,
    date_achieved: Option<DateTime>,
    updated_at: DateTime,
}

impl From<LeaderboardEntity> for MongoLeaderboardDocument {
    fn from(value: LeaderboardEntity) -> Self {
        Self {
            user_id: bson_uuid(value.user_id),
            best_score: i64::from(value.best_score),
            date_achieved: value.date_achieved.map(DateTime::from_system_time),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoLeaderboardDocument> for LeaderboardEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoLeaderboardDocument) -> Result<Self, Self::Error> {
        let best_score =
            u32::try_from(value.best_score).map_err(|_| MongoDaoError::InvalidDocument {
                collection: LEADERBOARD_COLLECTION_NAME,
                reason: format!("best score {} out of range", value.best_score),
            })?;

        Ok(Self {
            user_id: from_bson_uuid(value.user_id),
            best_score,
            date_achieved: value.date_achieved.map(|at| at.to_system_time()),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

/// Friendship edge written by the friendship service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoFriendshipDocument {
    from_user: bson::Uuid,
    to_user: bson::Uuid,
}

impl MongoFriendshipDocument {
    pub fn friend_id(&self) -> Uuid {
        from_bson_uuid(self.to_user)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAchievementDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    name: String,
    description: String,
    #[serde(default)]
    icon: Option<String>,
    created_at: DateTime,
}

impl From<MongoAchievementDocument> for AchievementEntity {
    fn from(value: MongoAchievementDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            name: value.name,
            description: value.description,
            icon: value.icon,
            created_at: value.created_at.to_system_time(),
        }
    }
}

/// Award edge written by the admin tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserAchievementDocument {
    user_id: bson::Uuid,
    achievement_id: bson::Uuid,
    awarded_at: DateTime,
}

impl From<MongoUserAchievementDocument> for UserAchievementEntity {
    fn from(value: MongoUserAchievementDocument) -> Self {
        Self {
            user_id: from_bson_uuid(value.user_id),
            achievement_id: from_bson_uuid(value.achievement_id),
            awarded_at: value.awarded_at.to_system_time(),
        }
    }
}

/// Row produced by [`best_scores_pipeline`].
#[derive(Debug, Clone, Deserialize)]
pub struct MongoBestScoreDocument {
    #[serde(rename = "_id")]
    user_id: bson::Uuid,
    username: String,
    best: i64,
}

impl TryFrom<MongoBestScoreDocument> for UserBestScore {
    type Error = MongoDaoError;

    fn try_from(value: MongoBestScoreDocument) -> Result<Self, Self::Error> {
        let score = u32::try_from(value.best).map_err(|_| MongoDaoError::InvalidDocument {
            collection: SESSION_COLLECTION_NAME,
            reason: format!("score {} out of range", value.best),
        })?;
        Ok(Self {
            user_id: from_bson_uuid(value.user_id),
            username: value.username,
            score,
        })
    }
}

/// Group matching sessions by owner, keep each owner's maximum score, join the username and
/// sort in leaderboard order.
pub fn best_scores_pipeline(filter: &SessionFilter, limit: usize) -> Vec<Document> {
    vec![
        doc! {"$match": session_query(filter)},
        doc! {"$group": {"_id": "$user_id", "best": {"$max": "$score"}}},
        doc! {"$lookup": {
            "from": USER_COLLECTION_NAME,
            "localField": "_id",
            "foreignField": "_id",
            "as": "user",
        }},
        doc! {"$unwind": "$user"},
        doc! {"$project": {"_id": 1, "best": 1, "username": "$user.username"}},
        doc! {"$sort": {"best": -1, "username": 1, "_id": 1}},
        doc! {"$limit": i64::try_from(limit).unwrap_or(i64::MAX)},
    ]
}

pub fn uuid_list(ids: &[Uuid]) -> Vec<Bson> {
    ids.iter().map(|id| Bson::from(bson_uuid(*id))).collect()
}

/// Translate a [`SessionFilter`] into a MongoDB query document.
pub fn session_query(filter: &SessionFilter) -> Document {
    let mut query = Document::new();

    if let Some(owners) = &filter.owners {
        query.insert("user_id", doc! {"$in": uuid_list(owners)});
    }
    if let Some(completed) = filter.completed {
        query.insert("completed", completed);
    }
    if let Some(difficulty) = filter.difficulty {
        query.insert("difficulty", i32::from(difficulty));
    }
    if let Some(min_score) = filter.min_score {
        query.insert("score", doc! {"$gte": i64::from(min_score)});
    }

    let mut window = Document::new();
    if let Some(from) = filter.completed_from {
        window.insert("$gte", DateTime::from_system_time(from));
    }
    if let Some(before) = filter.completed_before {
        window.insert("$lt", DateTime::from_system_time(before));
    }
    if !window.is_empty() {
        query.insert("completed_at", window);
    }

    query
}
