//! Best-score reconciliation inside lifecycle transactions and live ranked leaderboard queries.

use std::time::SystemTime;

use time::Date;
use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::{
        models::{LeaderboardEntity, SessionFilter},
        session_store::StoreTransaction,
    },
    dto::{
        leaderboard::{LeaderboardEntry, LeaderboardQuery},
        validation::parse_calendar_day,
    },
    error::ServiceError,
    identity::UserHandle,
    state::{
        SharedState,
        leaderboard::{self, Reconciliation},
        session_lifecycle::validate_difficulty,
    },
};

/// Bring `user_id`'s best-score record in line with their completed sessions.
///
/// Runs inside the caller's transaction; returns the record when the best score rose.
pub async fn reconcile(
    txn: &mut dyn StoreTransaction,
    user_id: Uuid,
    now: SystemTime,
) -> Result<Option<LeaderboardEntity>, ServiceError> {
    let filter = SessionFilter {
        min_score: Some(1),
        ..SessionFilter::owned_by(user_id).completed(true)
    };
    let sessions = txn.list_sessions(filter).await?;
    let existing = txn.find_leaderboard(user_id).await?;

    match leaderboard::reconcile(user_id, existing, &sessions, now) {
        Reconciliation::Unchanged => Ok(None),
        Reconciliation::Write { record, improved } => {
            debug!(%user_id, best_score = record.best_score, improved, "writing leaderboard record");
            txn.save_leaderboard(record.clone()).await?;
            Ok(improved.then_some(record))
        }
    }
}

fn parse_day(field: &'static str, raw: &str) -> Result<Date, ServiceError> {
    parse_calendar_day(raw).map_err(|err| {
        ServiceError::validation(field, format!("`{raw}` is not a YYYY-MM-DD date: {err}"))
    })
}

fn day_start(day: Date) -> SystemTime {
    day.midnight().assume_utc().into()
}

/// Translate inclusive calendar days into a half-open completion window.
fn completion_window(
    query: &LeaderboardQuery,
) -> Result<(Option<SystemTime>, Option<SystemTime>), ServiceError> {
    let from = query
        .date_from
        .as_deref()
        .map(|raw| parse_day("date_from", raw))
        .transpose()?;
    let to = query
        .date_to
        .as_deref()
        .map(|raw| parse_day("date_to", raw))
        .transpose()?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ServiceError::validation(
                "date_to",
                format!("date range ends ({to}) before it starts ({from})"),
            ));
        }
    }

    Ok((
        from.map(day_start),
        to.and_then(|day| day.next_day()).map(day_start),
    ))
}

/// Rank users by their best completed score within the requested filters.
pub async fn query(
    state: &SharedState,
    caller: Option<UserHandle>,
    query: &LeaderboardQuery,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let difficulty = query.difficulty.map(validate_difficulty).transpose()?;
    let (completed_from, completed_before) = completion_window(query)?;

    let store = state.require_store().await?;

    let owners = if query.friends_only {
        let caller = caller.ok_or_else(|| {
            ServiceError::Unauthorized("friends-only leaderboard requires a caller".into())
        })?;
        let friends = store.friend_ids(caller.id).await?;
        if friends.is_empty() {
            return Ok(Vec::new());
        }
        Some(friends)
    } else {
        None
    };

    let filter = SessionFilter {
        owners,
        completed: Some(true),
        difficulty,
        min_score: None,
        completed_from,
        completed_before,
    };
    let limit = state.config().leaderboard_limit;
    let best = store.best_scores(filter, limit).await?;

    let ranked = leaderboard::rank(best, limit);
    debug!(
        rows = ranked.len(),
        friends_only = query.friends_only,
        "leaderboard computed"
    );

    Ok(ranked.into_iter().map(Into::into).collect())
}
