//! Session lifecycle operations: start (with forfeiture), read, partial update and completion.
//!
//! Every write runs inside one store transaction under the owner's gate, so a user never ends
//! up with two sessions in progress and a completion is never visible without its
//! reconciled best score.

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{GameSessionEntity, LeaderboardEntity, SessionFilter},
        session_store::PuzzleStore,
    },
    dto::session::SessionResponse,
    error::ServiceError,
    identity::UserHandle,
    services::{leaderboard_service, sse_events},
    state::{
        AppState, SharedState,
        session_lifecycle::{
            SessionPatch, apply_patch, forfeit, new_session, validate_difficulty,
            validate_game_state,
        },
    },
};

fn session_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("session `{id}` not found"))
}

/// Start a new session for `user`, forfeiting any session still in progress.
pub async fn start_session(
    state: &SharedState,
    user: UserHandle,
    difficulty: i64,
    game_state: Value,
) -> Result<SessionResponse, ServiceError> {
    let difficulty = validate_difficulty(difficulty)?;
    validate_game_state(&game_state)?;

    let store = state.require_store().await?;
    let session = state
        .run_for_user(user.id, || {
            start_once(state, store.as_ref(), user, difficulty, game_state.clone())
        })
        .await?;

    info!(user_id = %user.id, session_id = %session.id, difficulty, "session started");
    Ok(session.into())
}

async fn start_once(
    state: &AppState,
    store: &dyn PuzzleStore,
    user: UserHandle,
    difficulty: u8,
    game_state: Value,
) -> Result<GameSessionEntity, ServiceError> {
    let mut txn = store.begin().await?;
    if !txn.lock_user(user.id).await? {
        return Err(ServiceError::NotFound(format!("user `{}` not found", user.id)));
    }

    let now = state.now();
    let in_progress = txn
        .list_sessions(SessionFilter::owned_by(user.id).completed(false))
        .await?;
    for mut stale in in_progress {
        forfeit(&mut stale, now);
        debug!(user_id = %user.id, session_id = %stale.id, "forfeiting unfinished session");
        txn.save_session(stale).await?;
    }

    let session = new_session(user.id, difficulty, game_state, now);
    txn.save_session(session.clone()).await?;
    txn.commit().await?;
    Ok(session)
}

/// Fetch a session owned by `user`.
pub async fn get_session(
    state: &SharedState,
    user: UserHandle,
    session_id: Uuid,
) -> Result<SessionResponse, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_session(session_id)
        .await?
        .filter(|session| session.user_id == user.id)
        .map(Into::into)
        .ok_or_else(|| session_not_found(session_id))
}

/// The user's sessions still in progress, most recently updated first.
pub async fn list_incomplete(
    state: &SharedState,
    user: UserHandle,
) -> Result<Vec<SessionResponse>, ServiceError> {
    let store = state.require_store().await?;
    let mut sessions = store
        .list_sessions(SessionFilter::owned_by(user.id).completed(false))
        .await?;
    sessions.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
    Ok(sessions.into_iter().map(Into::into).collect())
}

/// Apply a partial update; completing the session reconciles the owner's best score.
pub async fn update_session(
    state: &SharedState,
    user: UserHandle,
    session_id: Uuid,
    patch: SessionPatch,
) -> Result<SessionResponse, ServiceError> {
    let store = state.require_store().await?;
    let (session, raised) = state
        .run_for_user(user.id, || {
            update_once(state, store.as_ref(), user, session_id, patch.clone())
        })
        .await?;

    if let Some(record) = raised {
        sse_events::broadcast_best_score(state, &record);
    }
    Ok(session.into())
}

async fn update_once(
    state: &AppState,
    store: &dyn PuzzleStore,
    user: UserHandle,
    session_id: Uuid,
    patch: SessionPatch,
) -> Result<(GameSessionEntity, Option<LeaderboardEntity>), ServiceError> {
    let mut txn = store.begin().await?;
    if !txn.lock_user(user.id).await? {
        return Err(session_not_found(session_id));
    }

    let mut session = txn
        .find_session(session_id)
        .await?
        .filter(|session| session.user_id == user.id)
        .ok_or_else(|| session_not_found(session_id))?;

    let now = state.now();
    let effect = apply_patch(&mut session, patch, now)?;
    if effect.duration_ignored {
        debug!(%session_id, "play time already recorded; ignoring supplied duration");
    }
    txn.save_session(session.clone()).await?;

    let raised = if effect.reconcile {
        leaderboard_service::reconcile(txn.as_mut(), user.id, now).await?
    } else {
        None
    };
    txn.commit().await?;

    if effect.completed_now {
        info!(
            user_id = %user.id,
            %session_id,
            score = session.score,
            time_played_ms = session.time_played.map(|played| played.as_millis()),
            "session completed"
        );
    }
    Ok((session, raised))
}
