mod common;

use async_trait::async_trait;
use campus_api::{
    db::NewEvent,
    media::{ImageHost, MediaError, PosterUpload},
    model::{Category, Event},
    retention::{run_sweep, RetentionConfig},
};
use campus_id::UserId;
use chrono::{Duration, Utc};
use common::{start_api, ApiFixture, Session};

/// Image host whose deletes always fail.
struct UnreachableImageHost;

#[async_trait]
impl ImageHost for UnreachableImageHost {
    async fn upload(&self, _poster: PosterUpload) -> Result<String, MediaError> {
        Err(MediaError::Rejected("host unreachable".to_string()))
    }

    async fn destroy(&self, _poster_url: &str) -> Result<(), MediaError> {
        Err(MediaError::Rejected("host unreachable".to_string()))
    }
}

fn poster(tag: &str) -> String {
    format!("https://img.test/image/upload/campusconnect_events/{tag}.png")
}

/// Insert an approved event dated `age_days` ago, bypassing the API's
/// rule that events are created in the future.
async fn past_event(
    api: &ApiFixture,
    organizer: &Session,
    title: &str,
    age_days: i64,
    poster_url: Option<String>,
) -> Event {
    let organizer_id: UserId = organizer.user_id.parse().unwrap();
    let event = api
        .db
        .events()
        .create(NewEvent {
            title: title.to_string(),
            description: "Annual fest".to_string(),
            category: Category::Other,
            date: Utc::now().date_naive() - Duration::days(age_days),
            time: "10:00".to_string(),
            venue: "Grounds".to_string(),
            organizer_id,
            organization_name: Some("Robotics Club".to_string()),
            poster_url,
            external_form_url: None,
            has_refreshments: true,
            registration_deadline: None,
        })
        .await
        .unwrap();
    api.db.events().approve(&event.id).await.unwrap().unwrap()
}

async fn register_student(api: &ApiFixture, student: &Session, event: &Event) {
    let student_id: UserId = student.user_id.parse().unwrap();
    let snapshot = api
        .db
        .users()
        .find_by_id(&student_id)
        .await
        .unwrap()
        .unwrap()
        .snapshot()
        .unwrap();
    api.db
        .registrations()
        .register(&event.id, &student_id, &snapshot)
        .await
        .unwrap()
        .expect("event is approved");
}

#[tokio::test]
async fn sweep_deletes_only_events_past_the_window_with_their_registrations() {
    let api = start_api().await;
    let admin = api.admin().await;
    let organizer = api.approved_organizer(&admin).await;
    let student = api.student().await;

    let old = past_event(&api, &organizer, "Old Fest", 31, Some(poster("31"))).await;
    let recent = past_event(&api, &organizer, "Recent Fest", 29, Some(poster("29"))).await;
    register_student(&api, &student, &old).await;
    register_student(&api, &student, &recent).await;

    let report = run_sweep(
        &api.db,
        api.images.as_ref(),
        &RetentionConfig::default(),
        Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(report.expired, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.posters_failed, 0);

    assert!(api.db.events().find(&old.id).await.unwrap().is_none());
    assert!(api.db.registrations().list_for_event(&old.id).await.unwrap().is_empty());

    assert!(api.db.events().find(&recent.id).await.unwrap().is_some());
    assert_eq!(api.db.registrations().list_for_event(&recent.id).await.unwrap().len(), 1);

    assert_eq!(api.images.destroyed(), vec![poster("31")]);

    // The student's own listing only shows the surviving event.
    let student_id: UserId = student.user_id.parse().unwrap();
    let mine = api.db.registrations().list_for_student(&student_id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].event.id, recent.id);
}

#[tokio::test]
async fn failed_poster_delete_does_not_stop_the_sweep() {
    let api = start_api().await;
    let admin = api.admin().await;
    let organizer = api.approved_organizer(&admin).await;
    let student = api.student().await;

    let with_poster = past_event(&api, &organizer, "Poster Fest", 40, Some(poster("40"))).await;
    let without_poster = past_event(&api, &organizer, "Plain Fest", 45, None).await;
    register_student(&api, &student, &with_poster).await;

    let report = run_sweep(
        &api.db,
        &UnreachableImageHost,
        &RetentionConfig::default(),
        Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(report.expired, 2);
    assert_eq!(report.deleted, report.expired);
    assert_eq!(report.posters_failed, 1);
    assert_eq!(report.failed, 0);

    assert!(api.db.events().find(&with_poster.id).await.unwrap().is_none());
    assert!(api.db.events().find(&without_poster.id).await.unwrap().is_none());
    assert!(api
        .db
        .registrations()
        .list_for_event(&with_poster.id)
        .await
        .unwrap()
        .is_empty());
}
