use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{AchievementEntity, UserAchievementEntity},
    dto::format_system_time,
};

/// Achievement held by the caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AchievementResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    /// RFC 3339 time the achievement was awarded.
    pub awarded_at: String,
}

impl From<(UserAchievementEntity, AchievementEntity)> for AchievementResponse {
    fn from((award, achievement): (UserAchievementEntity, AchievementEntity)) -> Self {
        Self {
            id: achievement.id,
            name: achievement.name,
            description: achievement.description,
            icon: achievement.icon,
            awarded_at: format_system_time(award.awarded_at),
        }
    }
}
