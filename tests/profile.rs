mod common;

use std::time::Duration;

use common::{Harness, MARCH_FIRST, at};
use puzzle_back::{
    dao::models::{AchievementEntity, ProfileChanges},
    error::ServiceError,
    identity::UserHandle,
    services::{achievement_service, user_service},
};
use time::macros::date;
use uuid::Uuid;

fn achievement(name: &str) -> AchievementEntity {
    AchievementEntity {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        description: format!("{name} description"),
        icon: None,
        created_at: at(MARCH_FIRST),
    }
}

#[tokio::test]
async fn profile_fields_can_be_set_and_cleared() {
    let harness = Harness::new().await;
    let user = harness.register("editor").await;

    let profile = user_service::update_profile(
        &harness.state,
        user,
        ProfileChanges {
            bio: Some("speed solver".into()),
            date_of_birth: Some(Some(date!(1990 - 12 - 10))),
            email: Some(Some("editor@example.com".into())),
        },
    )
    .await
    .unwrap();
    assert_eq!(profile.bio, "speed solver");
    assert_eq!(profile.date_of_birth.as_deref(), Some("1990-12-10"));
    assert_eq!(profile.email.as_deref(), Some("editor@example.com"));

    let profile = user_service::update_profile(
        &harness.state,
        user,
        ProfileChanges {
            email: Some(None),
            ..ProfileChanges::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(profile.email, None);
    assert_eq!(profile.bio, "speed solver");
    assert_eq!(profile.date_of_birth.as_deref(), Some("1990-12-10"));

    let own = user_service::profile(&harness.state, user).await.unwrap();
    assert_eq!(own.bio, "speed solver");
    assert_eq!(own.email, None);
}

#[tokio::test]
async fn public_profile_withholds_the_email() {
    let harness = Harness::new().await;
    let user = user_service::register_user(
        &harness.state,
        "private".into(),
        Some("private@example.com".into()),
    )
    .await
    .unwrap();

    let own = user_service::profile(&harness.state, UserHandle::new(user.id))
        .await
        .unwrap();
    assert_eq!(own.email.as_deref(), Some("private@example.com"));

    let public = user_service::public_profile(&harness.state, "private".into())
        .await
        .unwrap();
    assert_eq!(public.email, None);
}

#[tokio::test]
async fn invalid_profile_edits_are_rejected() {
    let harness = Harness::new().await;
    let user = harness.register("strict").await;

    let err = user_service::update_profile(
        &harness.state,
        user,
        ProfileChanges {
            email: Some(Some("not-an-address".into())),
            ..ProfileChanges::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { field: "email", .. }));

    let err = user_service::update_profile(
        &harness.state,
        user,
        ProfileChanges {
            bio: Some("x".repeat(1_001)),
            ..ProfileChanges::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { field: "bio", .. }));

    let unchanged = user_service::profile(&harness.state, user).await.unwrap();
    assert_eq!(unchanged.bio, "");
    assert_eq!(unchanged.email, None);
}

#[tokio::test]
async fn editing_an_unknown_user_is_not_found() {
    let harness = Harness::new().await;
    let err = user_service::update_profile(
        &harness.state,
        UserHandle::new(Uuid::new_v4()),
        ProfileChanges {
            bio: Some("ghost".into()),
            ..ProfileChanges::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn achievements_are_listed_for_the_caller_only() {
    let harness = Harness::new().await;
    let holder = harness.register("holder").await;
    let other = harness.register("other").await;

    let first = achievement("first solve");
    let streak = achievement("streak");
    let unrelated = achievement("unrelated");
    for entity in [&first, &streak, &unrelated] {
        harness.store.add_achievement(entity.clone()).await;
    }
    harness
        .store
        .award_achievement(holder.id, streak.id, at(MARCH_FIRST + 200))
        .await
        .unwrap();
    harness
        .store
        .award_achievement(holder.id, first.id, at(MARCH_FIRST + 100))
        .await
        .unwrap();
    harness
        .store
        .award_achievement(other.id, unrelated.id, at(MARCH_FIRST))
        .await
        .unwrap();

    let listed = achievement_service::list_achievements(&harness.state, holder)
        .await
        .unwrap();
    let names: Vec<_> = listed.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, ["first solve", "streak"]);
    assert_eq!(listed[0].awarded_at, "2024-03-01T00:01:40Z");
}

#[tokio::test]
async fn awarding_twice_is_rejected() {
    let harness = Harness::new().await;
    let user = harness.register("repeat").await;
    let entity = achievement("once");
    harness.store.add_achievement(entity.clone()).await;

    let awarded = at(MARCH_FIRST) + Duration::from_secs(5);
    harness
        .store
        .award_achievement(user.id, entity.id, awarded)
        .await
        .unwrap();
    assert!(harness
        .store
        .award_achievement(user.id, entity.id, awarded)
        .await
        .is_err());
}

#[tokio::test]
async fn achievements_need_a_known_user() {
    let harness = Harness::new().await;
    let fresh = harness.register("fresh").await;
    assert!(achievement_service::list_achievements(&harness.state, fresh)
        .await
        .unwrap()
        .is_empty());

    let err = achievement_service::list_achievements(&harness.state, UserHandle::new(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
