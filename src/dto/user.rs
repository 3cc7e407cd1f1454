use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{LeaderboardEntity, ProfileChanges, UserEntity},
    dto::{
        format_system_time,
        validation::{
            parse_calendar_day, validate_bio, validate_calendar_day, validate_email_address,
            validate_username,
        },
    },
    error::ServiceError,
};

/// Payload used to register a player.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Validate for RegisterUserRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_username(&self.username) {
            errors.add("username", e);
        }
        if let Some(email) = &self.email {
            if let Err(e) = validate_email_address(email) {
                errors.add("email", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Partial edit of the caller's profile.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub bio: Option<String>,
    /// `YYYY-MM-DD`. If omitted, leaves the date unchanged; `null` removes it.
    #[serde(default, with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub date_of_birth: Option<Option<String>>,
    /// If omitted, leaves the address unchanged; `null` removes it.
    #[serde(default, with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub email: Option<Option<String>>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(bio) = &self.bio {
            if let Err(e) = validate_bio(bio) {
                errors.add("bio", e);
            }
        }
        if let Some(Some(day)) = &self.date_of_birth {
            if let Err(e) = validate_calendar_day(day) {
                errors.add("date_of_birth", e);
            }
        }
        if let Some(Some(email)) = &self.email {
            if let Err(e) = validate_email_address(email) {
                errors.add("email", e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl TryFrom<UpdateProfileRequest> for ProfileChanges {
    type Error = ServiceError;

    fn try_from(value: UpdateProfileRequest) -> Result<Self, Self::Error> {
        let date_of_birth = match value.date_of_birth {
            Some(Some(raw)) => Some(Some(parse_calendar_day(&raw).map_err(|err| {
                ServiceError::validation("date_of_birth", format!("`{raw}`: {err}"))
            })?)),
            Some(None) => Some(None),
            None => None,
        };

        Ok(Self {
            bio: value.bio,
            date_of_birth,
            email: value.email,
        })
    }
}

/// Registered user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub created_at: String,
}

impl From<UserEntity> for UserSummary {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Profile with the cached all-time best score.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    /// Only present on the caller's own profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub bio: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    pub best_score: u32,
    pub date_achieved: Option<String>,
    pub created_at: String,
}

impl From<(UserEntity, LeaderboardEntity)> for ProfileResponse {
    fn from((user, record): (UserEntity, LeaderboardEntity)) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            bio: user.bio,
            date_of_birth: user.date_of_birth.map(|date| date.to_string()),
            best_score: record.best_score,
            date_achieved: record.date_achieved.map(format_system_time),
            created_at: format_system_time(user.created_at),
        }
    }
}
