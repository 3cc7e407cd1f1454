//! Achievements earned by a user. Definitions and awards are written by the admin tooling.

use std::collections::HashMap;

use tracing::warn;

use crate::{
    dto::achievement::AchievementResponse, error::ServiceError, identity::UserHandle,
    state::SharedState,
};

/// Achievements awarded to `user`, oldest award first, ties by name.
pub async fn list_achievements(
    state: &SharedState,
    user: UserHandle,
) -> Result<Vec<AchievementResponse>, ServiceError> {
    let store = state.require_store().await?;
    if store.find_user(user.id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("user `{}` not found", user.id)));
    }

    let awards = store.user_achievements(user.id).await?;
    if awards.is_empty() {
        return Ok(Vec::new());
    }

    let definitions: HashMap<_, _> = store
        .find_achievements(awards.iter().map(|award| award.achievement_id).collect())
        .await?
        .into_iter()
        .map(|achievement| (achievement.id, achievement))
        .collect();

    let mut held: Vec<_> = awards
        .into_iter()
        .filter_map(|award| match definitions.get(&award.achievement_id) {
            Some(achievement) => Some((award, achievement.clone())),
            None => {
                warn!(
                    user_id = %user.id,
                    achievement_id = %award.achievement_id,
                    "award references a missing achievement; skipping"
                );
                None
            }
        })
        .collect();
    held.sort_by(|(a, a_def), (b, b_def)| {
        a.awarded_at
            .cmp(&b.awarded_at)
            .then_with(|| a_def.name.cmp(&b_def.name))
    });

    Ok(held.into_iter().map(AchievementResponse::from).collect())
}
