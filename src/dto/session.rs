use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::GameSessionEntity,
    dto::{
        format_system_time,
        validation::{validate_board_size, validate_game_state, validate_score},
    },
    state::session_lifecycle::SessionPatch,
};

/// Payload used to start a new puzzle session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    /// Board size: 3, 4 or 5.
    pub difficulty: i64,
    /// Initial board snapshot owned by the client.
    #[schema(value_type = Object)]
    pub game_state: Value,
}

impl Validate for StartSessionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_board_size(self.difficulty) {
            errors.add("difficulty", e);
        }
        if let Err(e) = validate_game_state(&self.game_state) {
            errors.add("game_state", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Partial update of a session. Omitted fields are left untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub game_state: Option<Value>,
    #[serde(default)]
    pub score: Option<i64>,
    /// `true` completes the session; `false` is only accepted while it is still in progress.
    #[serde(default)]
    pub completed: Option<bool>,
    /// Play time reported by the client, kept only if none is stored yet.
    #[serde(default)]
    pub time_played_ms: Option<u64>,
}

impl Validate for UpdateSessionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(ref state) = self.game_state {
            if let Err(e) = validate_game_state(state) {
                errors.add("game_state", e);
            }
        }
        if let Some(score) = self.score {
            if let Err(e) = validate_score(score) {
                errors.add("score", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<UpdateSessionRequest> for SessionPatch {
    fn from(value: UpdateSessionRequest) -> Self {
        Self {
            game_state: value.game_state,
            score: value.score,
            completed: value.completed,
            time_played: value.time_played_ms.map(Duration::from_millis),
        }
    }
}

/// Session as returned to its owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub difficulty: u8,
    #[schema(value_type = Object)]
    pub game_state: Value,
    pub score: u32,
    /// Elapsed play time in milliseconds, once known.
    pub time_played_ms: Option<u64>,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl From<GameSessionEntity> for SessionResponse {
    fn from(value: GameSessionEntity) -> Self {
        Self {
            id: value.id,
            difficulty: value.difficulty,
            game_state: value.game_state,
            score: value.score,
            time_played_ms: value
                .time_played
                .map(|played| u64::try_from(played.as_millis()).unwrap_or(u64::MAX)),
            completed: value.completed,
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
            completed_at: value.completed_at.map(format_system_time),
        }
    }
}
