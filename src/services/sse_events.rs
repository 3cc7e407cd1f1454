use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::LeaderboardEntity,
    dto::{
        format_system_time,
        sse::{BestScoreEvent, ServerEvent},
    },
    state::SharedState,
};

const EVENT_BEST_SCORE: &str = "leaderboard.best_score";

/// Broadcast that a user's all-time best score went up.
pub fn broadcast_best_score(state: &SharedState, record: &LeaderboardEntity) {
    let payload = BestScoreEvent {
        user_id: record.user_id,
        best_score: record.best_score,
        date_achieved: record.date_achieved.map(format_system_time),
    };
    send_leaderboard_event(state, EVENT_BEST_SCORE, &payload);
}

fn send_leaderboard_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.publish_best_score(event),
        Err(err) => warn!(event, error = %err, "failed to serialize leaderboard SSE payload"),
    }
}
