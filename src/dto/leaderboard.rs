use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::state::leaderboard::RankedScore;

/// Filters accepted by the leaderboard query.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Only count sessions played on this board size.
    pub difficulty: Option<i64>,
    /// First day (inclusive, `YYYY-MM-DD`, UTC) of the completion window.
    pub date_from: Option<String>,
    /// Last day (inclusive, `YYYY-MM-DD`, UTC) of the completion window.
    pub date_to: Option<String>,
    /// Restrict to the caller's friends; requires an identified caller.
    #[serde(default)]
    pub friends_only: bool,
}

/// One ranked leaderboard row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: Uuid,
    pub username: String,
    pub score: u32,
}

impl From<RankedScore> for LeaderboardEntry {
    fn from(value: RankedScore) -> Self {
        Self {
            rank: value.rank,
            user_id: value.user_id,
            username: value.username,
            score: value.score,
        }
    }
}
