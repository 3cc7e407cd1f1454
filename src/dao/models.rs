use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    time::{Duration, SystemTime},
};
use time::Date;
use uuid::Uuid;

/// Registered player account as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier, also used as the identity handle.
    pub id: Uuid,
    /// Unique display name.
    pub username: String,
    /// Contact address, private to the user.
    pub email: Option<String>,
    /// Free-form self description shown on the profile.
    pub bio: String,
    pub date_of_birth: Option<Date>,
    /// Registration timestamp.
    pub created_at: SystemTime,
}

impl UserEntity {
    /// Fresh account with an empty profile.
    pub fn new(username: String, email: Option<String>, created_at: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            bio: String::new(),
            date_of_birth: None,
            created_at,
        }
    }
}

/// Partial edit of the editable profile fields. `None` leaves a field untouched; for the
/// nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub bio: Option<String>,
    pub date_of_birth: Option<Option<Date>>,
    pub email: Option<Option<String>>,
}

impl ProfileChanges {
    /// Whether applying the changes would leave the user untouched.
    pub fn is_empty(&self) -> bool {
        self.bio.is_none() && self.date_of_birth.is_none() && self.email.is_none()
    }

    /// Apply the changes to an in-memory user.
    pub fn apply(&self, user: &mut UserEntity) {
        if let Some(bio) = &self.bio {
            user.bio = bio.clone();
        }
        if let Some(date_of_birth) = self.date_of_birth {
            user.date_of_birth = date_of_birth;
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
    }
}

/// Achievement definition, managed outside the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AchievementEntity {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Reference to the icon asset, if any.
    pub icon: Option<String>,
    pub created_at: SystemTime,
}

/// Award of an achievement to a user. A user holds each achievement at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAchievementEntity {
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    pub awarded_at: SystemTime,
}

/// Highest score of one user over a set of sessions, joined with the username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBestScore {
    pub user_id: Uuid,
    pub username: String,
    pub score: u32,
}

impl UserBestScore {
    /// Leaderboard order: score descending, then username, then user id.
    pub fn ranking_order(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.username.cmp(&other.username))
            .then_with(|| self.user_id.cmp(&other.user_id))
    }
}

/// One attempt at solving a puzzle board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Owner of the session.
    pub user_id: Uuid,
    /// Board size (3 for 3x3, 4 for 4x4, ...).
    pub difficulty: u8,
    /// Client-owned board snapshot (tiles, moves, timer, image reference).
    pub game_state: serde_json::Value,
    /// Score reported by the client.
    pub score: u32,
    /// Elapsed play time, written once.
    pub time_played: Option<Duration>,
    /// Whether the session reached its terminal state.
    pub completed: bool,
    /// Creation timestamp, origin of the computed play time.
    pub created_at: SystemTime,
    /// Last time the session was written.
    pub updated_at: SystemTime,
    /// When the session was completed or forfeited.
    pub completed_at: Option<SystemTime>,
}

/// Cached all-time best score of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntity {
    /// Owner of the record (one record per user).
    pub user_id: Uuid,
    /// Best score observed across completed sessions.
    pub best_score: u32,
    /// Completion time of the session holding the best score.
    pub date_achieved: Option<SystemTime>,
    /// Last time the record was written.
    pub updated_at: SystemTime,
}

impl LeaderboardEntity {
    /// Fresh record created alongside a new user.
    pub fn empty(user_id: Uuid, now: SystemTime) -> Self {
        Self {
            user_id,
            best_score: 0,
            date_achieved: None,
            updated_at: now,
        }
    }
}

/// Predicate used to select sessions from storage. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    /// Restrict to sessions owned by one of these users.
    pub owners: Option<Vec<Uuid>>,
    /// Restrict on the completed flag.
    pub completed: Option<bool>,
    /// Exact board size.
    pub difficulty: Option<u8>,
    /// Minimum score (inclusive).
    pub min_score: Option<u32>,
    /// Lower bound (inclusive) on `completed_at`.
    pub completed_from: Option<SystemTime>,
    /// Upper bound (exclusive) on `completed_at`.
    pub completed_before: Option<SystemTime>,
}

impl SessionFilter {
    /// Sessions owned by a single user.
    pub fn owned_by(user_id: Uuid) -> Self {
        Self {
            owners: Some(vec![user_id]),
            ..Self::default()
        }
    }

    /// Restrict on the completed flag.
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Evaluate the predicate against an in-memory session.
    pub fn matches(&self, session: &GameSessionEntity) -> bool {
        if let Some(owners) = &self.owners {
            if !owners.contains(&session.user_id) {
                return false;
            }
        }
        if self.completed.is_some_and(|flag| flag != session.completed) {
            return false;
        }
        if self.difficulty.is_some_and(|size| size != session.difficulty) {
            return false;
        }
        if self.min_score.is_some_and(|min| session.score < min) {
            return false;
        }
        if self.completed_from.is_some() || self.completed_before.is_some() {
            let Some(completed_at) = session.completed_at else {
                return false;
            };
            if self.completed_from.is_some_and(|from| completed_at < from) {
                return false;
            }
            if self
                .completed_before
                .is_some_and(|before| completed_at >= before)
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: Uuid, score: u32, completed_at: Option<SystemTime>) -> GameSessionEntity {
        let now = SystemTime::UNIX_EPOCH;
        GameSessionEntity {
            id: Uuid::new_v4(),
            user_id,
            difficulty: 3,
            game_state: serde_json::json!({}),
            score,
            time_played: None,
            completed: completed_at.is_some(),
            created_at: now,
            updated_at: now,
            completed_at,
        }
    }

    #[test]
    fn default_filter_matches_everything() {
        let entity = session(Uuid::new_v4(), 0, None);
        assert!(SessionFilter::default().matches(&entity));
    }

    #[test]
    fn owner_and_score_bounds_are_applied() {
        let owner = Uuid::new_v4();
        let filter = SessionFilter {
            min_score: Some(1),
            ..SessionFilter::owned_by(owner)
        };

        assert!(filter.matches(&session(owner, 10, None)));
        assert!(!filter.matches(&session(owner, 0, None)));
        assert!(!filter.matches(&session(Uuid::new_v4(), 10, None)));
    }

    #[test]
    fn profile_changes_only_touch_supplied_fields() {
        let mut user = UserEntity::new(
            "ada".into(),
            Some("ada@example.com".into()),
            SystemTime::UNIX_EPOCH,
        );
        user.bio = "tiles".into();

        ProfileChanges {
            email: Some(None),
            ..ProfileChanges::default()
        }
        .apply(&mut user);

        assert_eq!(user.email, None);
        assert_eq!(user.bio, "tiles");
    }

    #[test]
    fn ranking_order_breaks_ties_by_username() {
        let row = |name: &str, score| UserBestScore {
            user_id: Uuid::new_v4(),
            username: name.into(),
            score,
        };
        let mut rows = vec![row("bob", 10), row("cid", 30), row("ann", 10)];
        rows.sort_by(UserBestScore::ranking_order);

        let names: Vec<_> = rows.iter().map(|row| row.username.as_str()).collect();
        assert_eq!(names, vec!["cid", "ann", "bob"]);
    }

    #[test]
    fn completion_window_is_half_open_and_skips_unfinished() {
        let from = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let before = from + Duration::from_secs(100);
        let filter = SessionFilter {
            completed_from: Some(from),
            completed_before: Some(before),
            ..SessionFilter::default()
        };
        let owner = Uuid::new_v4();

        assert!(filter.matches(&session(owner, 1, Some(from))));
        assert!(!filter.matches(&session(owner, 1, Some(before))));
        assert!(!filter.matches(&session(owner, 1, None)));
    }
}
