//! Best-score reconciliation and ranking.

use std::{cmp::Ordering, time::SystemTime};

use uuid::Uuid;

use crate::dao::models::{GameSessionEntity, LeaderboardEntity, UserBestScore};

/// Highest qualifying score of a user and when it was first reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestScore {
    pub score: u32,
    pub achieved_at: Option<SystemTime>,
}

/// Best score over completed sessions with a positive score.
///
/// When several sessions share the maximum, the earliest completion is the achieving one.
pub fn best_completed<'a>(
    sessions: impl IntoIterator<Item = &'a GameSessionEntity>,
) -> Option<BestScore> {
    sessions
        .into_iter()
        .filter(|session| session.completed && session.score > 0)
        .fold(None, |best: Option<BestScore>, session| {
            let candidate = BestScore {
                score: session.score,
                achieved_at: session.completed_at,
            };
            match best {
                None => Some(candidate),
                Some(current) => match candidate.score.cmp(&current.score) {
                    Ordering::Greater => Some(candidate),
                    Ordering::Equal if earlier(candidate.achieved_at, current.achieved_at) => {
                        Some(candidate)
                    }
                    _ => Some(current),
                },
            }
        })
}

fn earlier(left: Option<SystemTime>, right: Option<SystemTime>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left < right,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Write required to bring a best-score record in line with the session history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The stored record is already at least as good.
    Unchanged,
    /// `record` must be persisted; `improved` is set when the best score rose.
    Write {
        record: LeaderboardEntity,
        improved: bool,
    },
}

/// Reconcile a user's record with their completed sessions.
///
/// The stored best score never decreases.
pub fn reconcile(
    user_id: Uuid,
    existing: Option<LeaderboardEntity>,
    sessions: &[GameSessionEntity],
    now: SystemTime,
) -> Reconciliation {
    let best = best_completed(sessions);

    match existing {
        None => {
            let mut record = LeaderboardEntity::empty(user_id, now);
            if let Some(best) = best {
                record.best_score = best.score;
                record.date_achieved = best.achieved_at;
            }
            let improved = record.best_score > 0;
            Reconciliation::Write { record, improved }
        }
        Some(mut record) => match best {
            Some(best) if best.score > record.best_score => {
                record.best_score = best.score;
                record.date_achieved = best.achieved_at;
                record.updated_at = now;
                Reconciliation::Write {
                    record,
                    improved: true,
                }
            }
            _ => Reconciliation::Unchanged,
        },
    }
}

/// One row of a ranked leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedScore {
    pub rank: u32,
    pub user_id: Uuid,
    pub username: String,
    pub score: u32,
}

/// Order per-user best scores for display and number them 1..N by position.
///
/// Equal scores are ordered by username then user id, and still get distinct ranks.
pub fn rank(mut rows: Vec<UserBestScore>, limit: usize) -> Vec<RankedScore> {
    rows.sort_by(UserBestScore::ranking_order);

    rows.into_iter()
        .take(limit)
        .zip(1u32..)
        .map(|(row, rank)| RankedScore {
            rank,
            user_id: row.user_id,
            username: row.username,
            score: row.score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn completed(user_id: Uuid, score: u32, completed_at: u64) -> GameSessionEntity {
        GameSessionEntity {
            id: Uuid::new_v4(),
            user_id,
            difficulty: 3,
            game_state: serde_json::json!({}),
            score,
            time_played: Some(Duration::from_secs(10)),
            completed: true,
            created_at: at(0),
            updated_at: at(completed_at),
            completed_at: Some(at(completed_at)),
        }
    }

    #[test]
    fn best_ignores_zero_and_unfinished_sessions() {
        let user = Uuid::new_v4();
        let mut unfinished = completed(user, 9_000, 10);
        unfinished.completed = false;
        let sessions = vec![completed(user, 0, 5), unfinished];

        assert_eq!(best_completed(&sessions), None);
    }

    #[test]
    fn best_prefers_earliest_completion_on_ties() {
        let user = Uuid::new_v4();
        let sessions = vec![completed(user, 500, 30), completed(user, 500, 20)];

        assert_eq!(
            best_completed(&sessions),
            Some(BestScore {
                score: 500,
                achieved_at: Some(at(20)),
            })
        );
    }

    #[test]
    fn reconcile_is_monotonic_over_a_score_history() {
        let user = Uuid::new_v4();
        let mut record = LeaderboardEntity::empty(user, at(0));
        let mut history = Vec::new();

        for (step, score) in [1000, 2000, 1500, 3000, 2500].into_iter().enumerate() {
            history.push(completed(user, score, 100 + step as u64));
            if let Reconciliation::Write { record: next, .. } =
                reconcile(user, Some(record.clone()), &history, at(200))
            {
                record = next;
            }
        }

        assert_eq!(record.best_score, 3000);
        assert_eq!(record.date_achieved, Some(at(103)));
    }

    #[test]
    fn reconcile_never_lowers_a_stored_best() {
        let user = Uuid::new_v4();
        let record = LeaderboardEntity {
            best_score: 4000,
            date_achieved: Some(at(1)),
            ..LeaderboardEntity::empty(user, at(0))
        };

        let outcome = reconcile(user, Some(record), &[completed(user, 3500, 50)], at(60));
        assert_eq!(outcome, Reconciliation::Unchanged);
    }

    #[test]
    fn missing_record_is_created() {
        let user = Uuid::new_v4();

        match reconcile(user, None, &[], at(5)) {
            Reconciliation::Write { record, improved } => {
                assert_eq!(record.best_score, 0);
                assert_eq!(record.date_achieved, None);
                assert!(!improved);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        match reconcile(user, None, &[completed(user, 80, 4)], at(5)) {
            Reconciliation::Write { record, improved } => {
                assert_eq!(record.best_score, 80);
                assert_eq!(record.date_achieved, Some(at(4)));
                assert!(improved);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    fn best(username: &str, score: u32) -> UserBestScore {
        UserBestScore {
            user_id: Uuid::new_v4(),
            username: username.to_owned(),
            score,
        }
    }

    #[test]
    fn ties_get_distinct_ranks_ordered_by_username() {
        let rows = vec![best("cid", 1000), best("bob", 3000), best("ann", 3000)];

        let ranked = rank(rows, 50);
        let summary: Vec<_> = ranked
            .iter()
            .map(|row| (row.rank, row.username.as_str(), row.score))
            .collect();

        assert_eq!(
            summary,
            vec![(1, "ann", 3000), (2, "bob", 3000), (3, "cid", 1000)]
        );
    }

    #[test]
    fn ranking_is_capped() {
        let rows: Vec<_> = (0..60)
            .map(|index| best(&format!("player{index:02}"), index + 1))
            .collect();

        let ranked = rank(rows, 50);
        assert_eq!(ranked.len(), 50);
        assert_eq!(ranked[0].score, 60);
        assert_eq!(ranked[49].rank, 50);
    }
}
