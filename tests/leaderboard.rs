mod common;

use std::time::Duration;

use common::{DAY, Harness, MARCH_FIRST, at};
use puzzle_back::{
    config::AppConfig,
    dao::session_store::PuzzleStore,
    dto::leaderboard::LeaderboardQuery,
    error::ServiceError,
    services::{leaderboard_service, session_service, user_service},
    state::session_lifecycle::SessionPatch,
};

fn ranks(rows: &[puzzle_back::dto::leaderboard::LeaderboardEntry]) -> Vec<(u32, &str, u32)> {
    rows.iter()
        .map(|row| (row.rank, row.username.as_str(), row.score))
        .collect()
}

#[tokio::test]
async fn registration_creates_a_zeroed_record() {
    let harness = Harness::new().await;
    let user = harness.register("newcomer").await;

    let record = harness.store.find_leaderboard(user.id).await.unwrap().unwrap();
    assert_eq!(record.best_score, 0);
    assert_eq!(record.date_achieved, None);

    let profile = user_service::public_profile(&harness.state, "newcomer".into())
        .await
        .unwrap();
    assert_eq!(profile.id, user.id);
    assert_eq!(profile.best_score, 0);
    assert_eq!(profile.date_achieved, None);
}

#[tokio::test]
async fn duplicate_and_malformed_usernames_are_rejected() {
    let harness = Harness::new().await;
    harness.register("taken").await;

    let err = user_service::register_user(&harness.state, "taken".into(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation {
            field: "username",
            ..
        }
    ));

    let err = user_service::register_user(&harness.state, "two words".into(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation {
            field: "username",
            ..
        }
    ));
}

#[tokio::test]
async fn best_score_only_moves_up() {
    let harness = Harness::new().await;
    let user = harness.register("climber").await;

    let mut record_holder = None;
    for score in [1000, 2000, 1500, 3000, 2500] {
        harness.clock.advance(Duration::from_secs(60));
        let session = harness.play(user, 3, score).await;
        if score == 3000 {
            record_holder = session.completed_at;
        }
    }

    let profile = user_service::profile(&harness.state, user).await.unwrap();
    assert_eq!(profile.best_score, 3000);
    assert_eq!(profile.date_achieved, record_holder);
}

#[tokio::test]
async fn score_edit_after_completion_can_only_raise_the_best() {
    let harness = Harness::new().await;
    let user = harness.register("editor").await;
    let session = harness.play(user, 3, 500).await;

    for score in [200, 1_200] {
        session_service::update_session(
            &harness.state,
            user,
            session.id,
            SessionPatch {
                score: Some(score),
                ..SessionPatch::default()
            },
        )
        .await
        .unwrap();
    }

    let profile = user_service::profile(&harness.state, user).await.unwrap();
    assert_eq!(profile.best_score, 1_200);
}

#[tokio::test]
async fn improvement_is_broadcast() {
    let harness = Harness::new().await;
    let user = harness.register("streamer").await;
    let mut events = harness.state.subscribe_best_scores();

    harness.play(user, 3, 750).await;
    harness.play(user, 3, 100).await;

    let event = events.try_recv().unwrap();
    assert_eq!(event.event.as_deref(), Some("leaderboard.best_score"));
    assert!(event.data.contains("750"));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn tied_scores_get_distinct_ranks() {
    let harness = Harness::new().await;
    let bob = harness.register("bob").await;
    let ann = harness.register("ann").await;
    let cid = harness.register("cid").await;

    harness.play(bob, 3, 3000).await;
    harness.play(ann, 3, 3000).await;
    harness.play(cid, 3, 1000).await;

    let rows = leaderboard_service::query(&harness.state, None, &LeaderboardQuery::default())
        .await
        .unwrap();
    assert_eq!(
        ranks(&rows),
        vec![(1, "ann", 3000), (2, "bob", 3000), (3, "cid", 1000)]
    );
}

#[tokio::test]
async fn difficulty_filter_uses_per_board_maximum() {
    let harness = Harness::new().await;
    let ann = harness.register("ann").await;
    let bob = harness.register("bob").await;

    harness.play(ann, 3, 5000).await;
    harness.play(ann, 4, 800).await;
    harness.play(bob, 4, 900).await;

    let query = LeaderboardQuery {
        difficulty: Some(4),
        ..LeaderboardQuery::default()
    };
    let rows = leaderboard_service::query(&harness.state, None, &query)
        .await
        .unwrap();
    assert_eq!(ranks(&rows), vec![(1, "bob", 900), (2, "ann", 800)]);

    let err = leaderboard_service::query(
        &harness.state,
        None,
        &LeaderboardQuery {
            difficulty: Some(9),
            ..LeaderboardQuery::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation {
            field: "difficulty",
            ..
        }
    ));
}

#[tokio::test]
async fn date_range_is_inclusive_on_calendar_days() {
    let harness = Harness::new().await;
    let early = harness.register("early").await;
    let middle = harness.register("middle").await;
    let edge = harness.register("edge").await;
    let late = harness.register("late").await;

    harness.clock.set(at(MARCH_FIRST + 3_600));
    harness.play(early, 3, 400).await;
    harness.clock.set(at(MARCH_FIRST) + DAY * 2 + Duration::from_secs(3_600));
    harness.play(middle, 3, 300).await;
    harness.clock.set(at(MARCH_FIRST) + DAY * 4 - Duration::from_secs(20));
    harness.play(edge, 3, 200).await;
    harness.clock.set(at(MARCH_FIRST) + DAY * 4 + Duration::from_secs(3_600));
    harness.play(late, 3, 100).await;

    let query = LeaderboardQuery {
        date_from: Some("2024-03-02".into()),
        date_to: Some("2024-03-04".into()),
        ..LeaderboardQuery::default()
    };
    let rows = leaderboard_service::query(&harness.state, None, &query)
        .await
        .unwrap();
    assert_eq!(ranks(&rows), vec![(1, "middle", 300), (2, "edge", 200)]);

    let reversed = LeaderboardQuery {
        date_from: Some("2024-03-04".into()),
        date_to: Some("2024-03-02".into()),
        ..LeaderboardQuery::default()
    };
    assert!(matches!(
        leaderboard_service::query(&harness.state, None, &reversed).await,
        Err(ServiceError::Validation { .. })
    ));
}

#[tokio::test]
async fn friends_only_follows_the_callers_edges() {
    let harness = Harness::new().await;
    let me = harness.register("me").await;
    let pal = harness.register("pal").await;
    let stranger = harness.register("stranger").await;

    harness.play(me, 3, 100).await;
    harness.play(pal, 3, 200).await;
    harness.play(stranger, 3, 300).await;
    harness.store.add_friendship(me.id, pal.id).await;
    harness.store.add_friendship(stranger.id, me.id).await;

    let query = LeaderboardQuery {
        friends_only: true,
        ..LeaderboardQuery::default()
    };
    let rows = leaderboard_service::query(&harness.state, Some(me), &query)
        .await
        .unwrap();
    assert_eq!(ranks(&rows), vec![(1, "pal", 200)]);

    let lonely = leaderboard_service::query(&harness.state, Some(pal), &query)
        .await
        .unwrap();
    assert!(lonely.is_empty());

    let err = leaderboard_service::query(&harness.state, None, &query)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(_)));
}

#[tokio::test]
async fn forfeited_attempts_rank_with_zero() {
    let harness = Harness::new().await;
    let quitter = harness.register("quitter").await;

    harness.start(quitter, 3).await;
    harness.start(quitter, 3).await;

    let rows = leaderboard_service::query(&harness.state, None, &LeaderboardQuery::default())
        .await
        .unwrap();
    assert_eq!(ranks(&rows), vec![(1, "quitter", 0)]);
}

#[tokio::test]
async fn results_are_capped_at_the_configured_limit() {
    let harness = Harness::new().await;
    for index in 0..55 {
        let user = harness.register(&format!("player{index:02}")).await;
        harness.play(user, 3, 100 + index).await;
    }

    let rows = leaderboard_service::query(&harness.state, None, &LeaderboardQuery::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 50);
    assert_eq!(rows[0].score, 154);
    assert_eq!(rows[0].rank, 1);
    assert_eq!(rows[49].rank, 50);

    let small = Harness::with_config(AppConfig {
        leaderboard_limit: 2,
        ..AppConfig::default()
    })
    .await;
    for name in ["a", "b", "c"] {
        let user = small.register(name).await;
        small.play(user, 3, 10).await;
    }
    let rows = leaderboard_service::query(&small.state, None, &LeaderboardQuery::default())
        .await
        .unwrap();
    assert_eq!(ranks(&rows), vec![(1, "a", 10), (2, "b", 10)]);
}
