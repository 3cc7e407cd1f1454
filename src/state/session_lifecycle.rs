//! Lifecycle rules of a single puzzle session.
//!
//! A session is `InProgress` until it is completed, either by its owner or by forfeiture when
//! the owner starts another one. Completion is terminal: nothing moves a session back.

use std::time::{Duration, SystemTime};

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::GameSessionEntity;

/// Supported board sizes.
pub const BOARD_SIZES: [u8; 3] = [3, 4, 5];

/// Rule violations detected while creating or mutating a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("difficulty must be one of 3, 4 or 5 (got {0})")]
    UnsupportedDifficulty(i64),
    #[error("game state must be a JSON object")]
    GameStateNotObject,
    #[error("score must not be negative (got {0})")]
    NegativeScore(i64),
    #[error("score {0} is out of range")]
    ScoreOutOfRange(i64),
    #[error("a completed session cannot be reopened")]
    Reopen,
}

impl LifecycleError {
    /// Request field the violation is attributed to.
    pub fn field(&self) -> &'static str {
        match self {
            LifecycleError::UnsupportedDifficulty(_) => "difficulty",
            LifecycleError::GameStateNotObject => "game_state",
            LifecycleError::NegativeScore(_) | LifecycleError::ScoreOutOfRange(_) => "score",
            LifecycleError::Reopen => "completed",
        }
    }
}

pub fn validate_difficulty(difficulty: i64) -> Result<u8, LifecycleError> {
    u8::try_from(difficulty)
        .ok()
        .filter(|size| BOARD_SIZES.contains(size))
        .ok_or(LifecycleError::UnsupportedDifficulty(difficulty))
}

pub fn validate_game_state(state: &Value) -> Result<(), LifecycleError> {
    if state.is_object() {
        Ok(())
    } else {
        Err(LifecycleError::GameStateNotObject)
    }
}

pub fn validate_score(score: i64) -> Result<u32, LifecycleError> {
    if score < 0 {
        return Err(LifecycleError::NegativeScore(score));
    }
    u32::try_from(score).map_err(|_| LifecycleError::ScoreOutOfRange(score))
}

/// Time elapsed between creation and `now`, clamped at zero when the clock went backwards.
pub fn elapsed_since(created_at: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(created_at).unwrap_or(Duration::ZERO)
}

/// Build a fresh in-progress session.
pub fn new_session(
    user_id: Uuid,
    difficulty: u8,
    game_state: Value,
    now: SystemTime,
) -> GameSessionEntity {
    GameSessionEntity {
        id: Uuid::new_v4(),
        user_id,
        difficulty,
        game_state,
        score: 0,
        time_played: None,
        completed: false,
        created_at: now,
        updated_at: now,
        completed_at: None,
    }
}

/// Abandon an in-progress session because its owner started another one.
///
/// A forfeit is recorded as a completed zero-score attempt.
pub fn forfeit(session: &mut GameSessionEntity, now: SystemTime) {
    session.completed = true;
    session.score = 0;
    session.completed_at = Some(now);
    if session.time_played.is_none() {
        session.time_played = Some(elapsed_since(session.created_at, now));
    }
    session.updated_at = now;
}

/// Partial update requested by the session owner.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub game_state: Option<Value>,
    pub score: Option<i64>,
    pub completed: Option<bool>,
    pub time_played: Option<Duration>,
}

/// What a successfully applied patch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchEffect {
    /// The session went from in-progress to completed.
    pub completed_now: bool,
    /// The owner's best-score record has to be reconciled.
    pub reconcile: bool,
    /// A duration was supplied but one was already stored.
    pub duration_ignored: bool,
}

/// Validate and apply `patch` to `session`.
///
/// Nothing is modified when validation fails.
pub fn apply_patch(
    session: &mut GameSessionEntity,
    patch: SessionPatch,
    now: SystemTime,
) -> Result<PatchEffect, LifecycleError> {
    if let Some(state) = &patch.game_state {
        validate_game_state(state)?;
    }
    let score = patch.score.map(validate_score).transpose()?;
    if patch.completed == Some(false) && session.completed {
        return Err(LifecycleError::Reopen);
    }

    let mut effect = PatchEffect::default();

    if let Some(state) = patch.game_state {
        session.game_state = state;
    }

    let mut score_changed = false;
    if let Some(score) = score {
        score_changed = score != session.score;
        session.score = score;
    }

    if let Some(played) = patch.time_played {
        if session.time_played.is_none() {
            session.time_played = Some(played);
        } else {
            effect.duration_ignored = true;
        }
    }

    if patch.completed == Some(true) && !session.completed {
        session.completed = true;
        session.completed_at = Some(now);
        if session.time_played.is_none() {
            session.time_played = Some(elapsed_since(session.created_at, now));
        }
        effect.completed_now = true;
    }

    effect.reconcile = effect.completed_now || (session.completed && score_changed);
    session.updated_at = now;
    Ok(effect)
}
