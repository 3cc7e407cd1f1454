//! Player registration and profile projections.

use tracing::{debug, info, warn};
use validator::ValidationError;

use crate::{
    dao::{
        models::{LeaderboardEntity, ProfileChanges, UserEntity},
        session_store::PuzzleStore,
        storage::StorageError,
    },
    dto::{
        user::{ProfileResponse, UserSummary},
        validation::{validate_bio, validate_email_address, validate_username},
    },
    error::ServiceError,
    identity::UserHandle,
    state::{AppState, SharedState},
};

fn username_taken(username: &str) -> ServiceError {
    ServiceError::validation("username", format!("username `{username}` is already taken"))
}

fn duplicate_as_taken(username: &str) -> impl FnOnce(StorageError) -> ServiceError + '_ {
    move |err| match err {
        StorageError::Duplicate { .. } => username_taken(username),
        other => other.into(),
    }
}

fn field_error(field: &'static str) -> impl FnOnce(ValidationError) -> ServiceError {
    move |err| {
        ServiceError::validation(
            field,
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| err.code.into_owned()),
        )
    }
}

/// Register a user together with their empty leaderboard record.
pub async fn register_user(
    state: &SharedState,
    username: String,
    email: Option<String>,
) -> Result<UserSummary, ServiceError> {
    validate_username(&username).map_err(field_error("username"))?;
    if let Some(email) = &email {
        validate_email_address(email).map_err(field_error("email"))?;
    }

    let store = state.require_store().await?;
    if store.find_user_by_username(username.clone()).await?.is_some() {
        return Err(username_taken(&username));
    }

    let user = UserEntity::new(username, email, state.now());
    state
        .run_for_user(user.id, || register_once(state, store.as_ref(), user.clone()))
        .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

async fn register_once(
    state: &AppState,
    store: &dyn PuzzleStore,
    user: UserEntity,
) -> Result<(), ServiceError> {
    let mut txn = store.begin().await?;
    let record = LeaderboardEntity::empty(user.id, state.now());
    txn.insert_user(user.clone())
        .await
        .map_err(duplicate_as_taken(&user.username))?;
    txn.save_leaderboard(record).await?;
    txn.commit()
        .await
        .map_err(duplicate_as_taken(&user.username))?;
    Ok(())
}

async fn profile_of(
    store: &dyn PuzzleStore,
    user: UserEntity,
) -> Result<ProfileResponse, ServiceError> {
    let record = match store.find_leaderboard(user.id).await? {
        Some(record) => record,
        None => {
            warn!(user_id = %user.id, "leaderboard record missing; reporting an empty one");
            LeaderboardEntity::empty(user.id, user.created_at)
        }
    };
    Ok((user, record).into())
}

/// Profile of the calling user.
pub async fn profile(
    state: &SharedState,
    user: UserHandle,
) -> Result<ProfileResponse, ServiceError> {
    let store = state.require_store().await?;
    let entity = store
        .find_user(user.id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{}` not found", user.id)))?;
    profile_of(store.as_ref(), entity).await
}

/// Apply profile edits of the calling user and return the refreshed profile.
pub async fn update_profile(
    state: &SharedState,
    user: UserHandle,
    changes: ProfileChanges,
) -> Result<ProfileResponse, ServiceError> {
    if let Some(bio) = &changes.bio {
        validate_bio(bio).map_err(field_error("bio"))?;
    }
    if let Some(Some(email)) = &changes.email {
        validate_email_address(email).map_err(field_error("email"))?;
    }

    let store = state.require_store().await?;
    let entity = store
        .update_profile(user.id, changes.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{}` not found", user.id)))?;

    debug!(
        user_id = %user.id,
        bio = changes.bio.is_some(),
        date_of_birth = changes.date_of_birth.is_some(),
        email = changes.email.is_some(),
        "profile updated"
    );
    profile_of(store.as_ref(), entity).await
}

/// Public profile looked up by username; the email address is withheld.
pub async fn public_profile(
    state: &SharedState,
    username: String,
) -> Result<ProfileResponse, ServiceError> {
    let store = state.require_store().await?;
    let entity = store
        .find_user_by_username(username.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{username}` not found")))?;
    let mut profile = profile_of(store.as_ref(), entity).await?;
    profile.email = None;
    Ok(profile)
}
