//! Database-backed flows. Set `VOLUNTR_TEST_DATABASE_URL` to run them; otherwise they skip.

mod common;

use chrono::{Duration, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use common::*;
use voluntr_api::schema::{users, verification_requests};
use voluntr_api::services::applications::{self, ApplicationStatus};
use voluntr_api::services::events;
use voluntr_api::services::lifecycle::{ComputedStatus, EventStatus};
use voluntr_api::services::notifications::{self, Notifier};
use voluntr_api::services::ratings::{self, RatingInput};
use voluntr_api::services::{chat, verification};
use voluntr_shared::clients::push::PushClient;
use voluntr_shared::errors::ErrorCode;
use voluntr_shared::types::auth::UserRole;

#[tokio::test]
async fn volunteer_and_organiser_rate_each_other() {
    let Some(pool) = test_pool() else { return };
    let mut conn = pool.get().unwrap();

    let organiser = insert_user(&mut conn, UserRole::Organiser);
    let volunteer = insert_user(&mut conn, UserRole::Volunteer);
    let event = tomorrow_event(&mut conn, organiser, EventStatus::Open);
    let now = Utc::now();

    let application = applications::apply(&mut conn, event.id, volunteer, now).unwrap();
    assert_eq!(application.status, "pending");

    let again = applications::apply(&mut conn, event.id, volunteer, now).unwrap_err();
    assert_eq!(again.code(), ErrorCode::AlreadyApplied);

    let change = applications::update_status(&mut conn, application.id, organiser, ApplicationStatus::Accepted).unwrap();
    assert!(change.changed);
    let push = change.notification().expect("volunteer is notified");
    assert_eq!(push.data["status"], "accepted");

    let volunteer_auth = auth(volunteer, UserRole::Volunteer);
    let organiser_auth = auth(organiser, UserRole::Organiser);
    let rate_organiser = RatingInput {
        event_id: event.id,
        ratee_id: organiser,
        score: 5,
        comment: Some("well run".into()),
    };

    let early = ratings::give_rating(&mut conn, &volunteer_auth, rate_organiser.clone(), now).unwrap_err();
    assert_eq!(early.code(), ErrorCode::EventNotCompleted);

    let after = event.schedule().end() + Duration::hours(1);
    assert_eq!(event.computed_status(after), ComputedStatus::Completed);

    ratings::give_rating(&mut conn, &volunteer_auth, rate_organiser.clone(), after).unwrap();
    let twice = ratings::give_rating(&mut conn, &volunteer_auth, rate_organiser, after).unwrap_err();
    assert_eq!(twice.code(), ErrorCode::AlreadyRated);

    let rate_volunteer = RatingInput {
        event_id: event.id,
        ratee_id: volunteer,
        score: 4,
        comment: None,
    };
    ratings::give_rating(&mut conn, &organiser_auth, rate_volunteer, after).unwrap();

    assert!(ratings::has_rated(&mut conn, event.id, volunteer, organiser).unwrap());

    let organiser_summary = ratings::summary(&mut conn, organiser).unwrap();
    assert_eq!(organiser_summary.rating, 5.0);
    assert_eq!(organiser_summary.review_count, 1);

    let volunteer_summary = ratings::summary(&mut conn, volunteer).unwrap();
    assert_eq!(volunteer_summary.rating, 4.0);
    assert_eq!(volunteer_summary.event_count, 1);
}

#[tokio::test]
async fn outsiders_cannot_rate() {
    let Some(pool) = test_pool() else { return };
    let mut conn = pool.get().unwrap();

    let organiser = insert_user(&mut conn, UserRole::Organiser);
    let applicant = insert_user(&mut conn, UserRole::Volunteer);
    let bystander = insert_user(&mut conn, UserRole::Volunteer);
    let event = tomorrow_event(&mut conn, organiser, EventStatus::Open);

    // Pending is not participation.
    applications::apply(&mut conn, event.id, applicant, Utc::now()).unwrap();
    let after = event.schedule().end() + Duration::hours(1);

    for volunteer in [applicant, bystander] {
        let err = ratings::give_rating(
            &mut conn,
            &auth(volunteer, UserRole::Volunteer),
            RatingInput { event_id: event.id, ratee_id: organiser, score: 3, comment: None },
            after,
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotEligibleToRate);
    }

    let wrong_ratee = ratings::give_rating(
        &mut conn,
        &auth(applicant, UserRole::Volunteer),
        RatingInput { event_id: event.id, ratee_id: bystander, score: 3, comment: None },
        after,
    )
    .unwrap_err();
    assert_eq!(wrong_ratee.code(), ErrorCode::InvalidRatee);
}

#[tokio::test]
async fn concurrent_applies_yield_one_row() {
    let Some(pool) = test_pool() else { return };
    let (event_id, volunteer) = {
        let mut conn = pool.get().unwrap();
        let organiser = insert_user(&mut conn, UserRole::Organiser);
        let volunteer = insert_user(&mut conn, UserRole::Volunteer);
        (tomorrow_event(&mut conn, organiser, EventStatus::Open).id, volunteer)
    };

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let pool = pool.clone();
                scope.spawn(move || {
                    let mut conn = pool.get().unwrap();
                    applications::apply(&mut conn, event_id, volunteer, Utc::now())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert_eq!(err.code(), ErrorCode::AlreadyApplied);
    }
}

#[tokio::test]
async fn chat_message_reaches_counterpart_device() {
    let Some(pool) = test_pool() else { return };
    let mut conn = pool.get().unwrap();

    let organiser = insert_user(&mut conn, UserRole::Organiser);
    let volunteer = insert_user(&mut conn, UserRole::Volunteer);
    let event = tomorrow_event(&mut conn, organiser, EventStatus::Open);

    let organiser_auth = auth(organiser, UserRole::Organiser);
    let first = chat::get_or_create_thread(&mut conn, &organiser_auth, event.id, Some(volunteer)).unwrap();
    assert!(first.created);

    let second = chat::get_or_create_thread(&mut conn, &organiser_auth, event.id, Some(volunteer)).unwrap();
    assert!(!second.created);
    assert_eq!(second.thread.id, first.thread.id);

    let from_volunteer =
        chat::get_or_create_thread(&mut conn, &auth(volunteer, UserRole::Volunteer), event.id, None).unwrap();
    assert_eq!(from_volunteer.thread.id, first.thread.id);

    let device = format!("device-{}", Uuid::new_v4());
    let registered = notifications::register_token(&mut conn, organiser, &device, None).unwrap();
    assert_eq!(registered.platform, notifications::DEFAULT_PLATFORM);

    let sent = chat::send_message(&mut conn, first.thread.id, volunteer, "  hello ").unwrap();
    assert_eq!(sent.message.message, "hello");
    assert_eq!(sent.recipient_id, organiser);

    let history = chat::get_messages(&mut conn, first.thread.id, organiser).unwrap();
    assert_eq!(history.messages, vec![sent.message.clone()]);

    let notifier = Notifier::new(pool.clone(), PushClient::recording());
    let report = notifier.notify_users(&[sent.recipient_id], &sent.push_message()).await.unwrap();
    assert_eq!(report.sent, 1);

    let deliveries = notifier.push_client().recorded();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].token, device);
    assert_eq!(deliveries[0].message.body, "hello");
    assert_eq!(deliveries[0].message.data["threadId"], first.thread.id.to_string());
}

#[tokio::test]
async fn non_members_see_missing_threads() {
    let Some(pool) = test_pool() else { return };
    let mut conn = pool.get().unwrap();

    let organiser = insert_user(&mut conn, UserRole::Organiser);
    let volunteer = insert_user(&mut conn, UserRole::Volunteer);
    let outsider = insert_user(&mut conn, UserRole::Volunteer);
    let event = tomorrow_event(&mut conn, organiser, EventStatus::Open);
    let thread = chat::get_or_create_thread(&mut conn, &auth(organiser, UserRole::Organiser), event.id, Some(volunteer))
        .unwrap()
        .thread;

    let existing = chat::get_messages(&mut conn, thread.id, outsider).unwrap_err();
    let missing = chat::get_messages(&mut conn, Uuid::new_v4(), outsider).unwrap_err();
    assert_eq!(existing.code(), ErrorCode::ThreadNotFound);
    assert_eq!(existing.code(), missing.code());
    assert_eq!(existing.to_string(), missing.to_string());

    let send = chat::send_message(&mut conn, thread.id, outsider, "let me in").unwrap_err();
    assert_eq!(send.code(), ErrorCode::ThreadNotFound);

    let stranger_org = insert_user(&mut conn, UserRole::Organiser);
    let not_owner = chat::get_or_create_thread(&mut conn, &auth(stranger_org, UserRole::Organiser), event.id, Some(volunteer))
        .unwrap_err();
    assert_eq!(not_owner.code(), ErrorCode::NotEventOwner);
}

#[tokio::test]
async fn drafts_are_owner_only() {
    let Some(pool) = test_pool() else { return };
    let mut conn = pool.get().unwrap();

    let organiser = insert_user(&mut conn, UserRole::Organiser);
    let volunteer = insert_user(&mut conn, UserRole::Volunteer);
    let draft = tomorrow_event(&mut conn, organiser, EventStatus::Draft);

    assert_eq!(
        events::get_visible(&mut conn, draft.id, None).unwrap_err().code(),
        ErrorCode::EventNotFound
    );
    let own = events::get_visible(&mut conn, draft.id, Some(organiser)).unwrap();
    assert_eq!(own.computed_status, ComputedStatus::Draft);

    let apply = applications::apply(&mut conn, draft.id, volunteer, Utc::now()).unwrap_err();
    assert_eq!(apply.code(), ErrorCode::EventNotOpen);

    events::soft_delete_event(&mut conn, draft.id).unwrap();
    assert_eq!(
        events::get_visible(&mut conn, draft.id, Some(organiser)).unwrap_err().code(),
        ErrorCode::EventNotFound
    );
}

#[tokio::test]
async fn approval_verifies_user_once() {
    let Some(pool) = test_pool() else { return };
    let mut conn = pool.get().unwrap();

    let admin = insert_user(&mut conn, UserRole::Admin);
    let organiser = insert_user(&mut conn, UserRole::Organiser);
    let request_id: Uuid = diesel::insert_into(verification_requests::table)
        .values((
            verification_requests::user_id.eq(organiser),
            verification_requests::status.eq(verification::PENDING),
        ))
        .returning(verification_requests::id)
        .get_result(&mut conn)
        .unwrap();

    let approved = verification::approve(&mut conn, request_id, admin).unwrap();
    assert_eq!(approved.status, verification::APPROVED);
    assert_eq!(approved.reviewed_by, Some(admin));

    let verified: bool = users::table
        .find(organiser)
        .select(users::is_verified)
        .first(&mut conn)
        .unwrap();
    assert!(verified);

    let again = verification::reject(&mut conn, request_id, admin, Some("late".into())).unwrap_err();
    assert_eq!(again.code(), ErrorCode::Conflict);
}


#[tokio::test]
async fn concurrent_thread_opens_share_one_thread() {
    let Some(pool) = test_pool() else { return };
    let (event_id, organiser, volunteer) = {
        let mut conn = pool.get().unwrap();
        let organiser = insert_user(&mut conn, UserRole::Organiser);
        let volunteer = insert_user(&mut conn, UserRole::Volunteer);
        (tomorrow_event(&mut conn, organiser, EventStatus::Open).id, organiser, volunteer)
    };

    let lookups: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let pool = pool.clone();
                scope.spawn(move || {
                    let mut conn = pool.get().unwrap();
                    // Both sides race to open the same conversation.
                    if i % 2 == 0 {
                        chat::get_or_create_thread(&mut conn, &auth(organiser, UserRole::Organiser), event_id, Some(volunteer))
                    } else {
                        chat::get_or_create_thread(&mut conn, &auth(volunteer, UserRole::Volunteer), event_id, None)
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
    });

    assert_eq!(lookups.iter().filter(|l| l.created).count(), 1);
    let id = lookups[0].thread.id;
    assert!(lookups.iter().all(|l| l.thread.id == id));
}

#[tokio::test]
async fn concurrent_ratings_store_one_row() {
    let Some(pool) = test_pool() else { return };
    let (event, organiser, volunteer) = {
        let mut conn = pool.get().unwrap();
        let organiser = insert_user(&mut conn, UserRole::Organiser);
        let volunteer = insert_user(&mut conn, UserRole::Volunteer);
        let event = tomorrow_event(&mut conn, organiser, EventStatus::Open);
        let application = applications::apply(&mut conn, event.id, volunteer, Utc::now()).unwrap();
        applications::update_status(&mut conn, application.id, organiser, ApplicationStatus::Accepted).unwrap();
        (event, organiser, volunteer)
    };
    let after = event.schedule().end() + Duration::hours(1);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let pool = pool.clone();
                let input = RatingInput { event_id: event.id, ratee_id: organiser, score: 5, comment: None };
                scope.spawn(move || {
                    let mut conn = pool.get().unwrap();
                    ratings::give_rating(&mut conn, &auth(volunteer, UserRole::Volunteer), input, after)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert_eq!(err.code(), ErrorCode::AlreadyRated);
    }

    let mut conn = pool.get().unwrap();
    assert_eq!(ratings::summary(&mut conn, organiser).unwrap().review_count, 1);
}

#[tokio::test]
async fn thread_with_unknown_volunteer_is_not_found() {
    let Some(pool) = test_pool() else { return };
    let mut conn = pool.get().unwrap();

    let organiser = insert_user(&mut conn, UserRole::Organiser);
    let event = tomorrow_event(&mut conn, organiser, EventStatus::Open);

    let err = chat::get_or_create_thread(&mut conn, &auth(organiser, UserRole::Organiser), event.id, Some(Uuid::new_v4()))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(err.code().status_code(), axum::http::StatusCode::NOT_FOUND);
}
