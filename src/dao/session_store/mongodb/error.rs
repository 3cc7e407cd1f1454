use mongodb::error::{Error as MongoError, ErrorKind, TRANSIENT_TRANSACTION_ERROR, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to start MongoDB transaction")]
    StartTransaction {
        #[source]
        source: MongoError,
    },
    #[error("failed to commit MongoDB transaction")]
    CommitTransaction {
        #[source]
        source: MongoError,
    },
    #[error("failed to save user `{id}`")]
    SaveUser {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to lock user `{id}`")]
    LockUser {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load users")]
    LoadUsers {
        #[source]
        source: MongoError,
    },
    #[error("failed to save session `{id}`")]
    SaveSession {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load session `{id}`")]
    LoadSession {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list sessions")]
    ListSessions {
        #[source]
        source: MongoError,
    },
    #[error("failed to save leaderboard record of user `{user_id}`")]
    SaveLeaderboard {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load leaderboard record of user `{user_id}`")]
    LoadLeaderboard {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update profile of user `{id}`")]
    UpdateProfile {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to aggregate best scores")]
    BestScores {
        #[source]
        source: MongoError,
    },
    #[error("failed to load achievements")]
    LoadAchievements {
        #[source]
        source: MongoError,
    },
    #[error("failed to list friends of user `{user_id}`")]
    ListFriends {
        user_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("invalid stored value in `{collection}`: {reason}")]
    InvalidDocument {
        collection: &'static str,
        reason: String,
    },
}

impl MongoDaoError {
    fn mongo_source(&self) -> Option<&MongoError> {
        match self {
            MongoDaoError::InvalidUri { source, .. }
            | MongoDaoError::ClientConstruction { source }
            | MongoDaoError::InitialPing { source, .. }
            | MongoDaoError::HealthPing { source }
            | MongoDaoError::EnsureIndex { source, .. }
            | MongoDaoError::StartTransaction { source }
            | MongoDaoError::CommitTransaction { source }
            | MongoDaoError::SaveUser { source, .. }
            | MongoDaoError::LockUser { source, .. }
            | MongoDaoError::LoadUsers { source }
            | MongoDaoError::SaveSession { source, .. }
            | MongoDaoError::LoadSession { source, .. }
            | MongoDaoError::ListSessions { source }
            | MongoDaoError::SaveLeaderboard { source, .. }
            | MongoDaoError::LoadLeaderboard { source, .. }
            | MongoDaoError::UpdateProfile { source, .. }
            | MongoDaoError::BestScores { source }
            | MongoDaoError::LoadAchievements { source }
            | MongoDaoError::ListFriends { source, .. } => Some(source),
            MongoDaoError::MissingEnvVar { .. } | MongoDaoError::InvalidDocument { .. } => None,
        }
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err.mongo_source() {
            Some(source) if source.contains_label(TRANSIENT_TRANSACTION_ERROR) => {
                StorageError::conflict(err.to_string())
            }
            Some(source) if is_duplicate_key(source) => StorageError::duplicate(err.to_string()),
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}
