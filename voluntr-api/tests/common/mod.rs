//! Fixtures shared by the integration suites.
#![allow(dead_code)]

pub mod sio;

use std::sync::{Arc, Once};
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use jsonwebtoken::{encode, EncodingKey, Header};
use socketioxide::SocketIo;
use uuid::Uuid;

use voluntr_api::config::AppConfig;
use voluntr_api::models::Event;
use voluntr_api::schema::users;
use voluntr_api::services::events::{self, EventInput, EventType};
use voluntr_api::services::lifecycle::EventStatus;
use voluntr_api::services::notifications::Notifier;
use voluntr_api::services::rate_limiter::{RateLimiter, RatePolicy};
use voluntr_api::{attach_socket_handlers, router, AppState};
use voluntr_shared::clients::db::{create_pool, DbPool};
use voluntr_shared::clients::push::PushClient;
use voluntr_shared::types::auth::{AuthUser, Claims, UserRole};

pub const SECRET: &str = "integration-secret";

const MIGRATION: &str = include_str!("../../migrations/2024-01-01-000000_create_core/up.sql");

static MIGRATED: Once = Once::new();

/// Pool on `VOLUNTR_TEST_DATABASE_URL` with the schema applied, or `None` to skip.
pub fn test_pool() -> Option<DbPool> {
    let Ok(url) = std::env::var("VOLUNTR_TEST_DATABASE_URL") else {
        eprintln!("VOLUNTR_TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let pool = create_pool(&url, 8).expect("test database pool");
    MIGRATED.call_once(|| {
        let mut conn = pool.get().expect("test connection");
        conn.batch_execute(MIGRATION).expect("apply migration");
    });
    Some(pool)
}

/// Pool that never connects. Checkouts fail after a short wait.
pub fn offline_pool() -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new("postgres://nobody@127.0.0.1:1/none");
    Pool::builder()
        .max_size(1)
        .connection_timeout(Duration::from_millis(200))
        .build_unchecked(manager)
}

/// Serves the full router (HTTP and Socket.IO) on an ephemeral port.
pub async fn serve(db: DbPool) -> (String, Arc<AppState>) {
    std::env::set_var("JWT_SECRET", SECRET);

    let (sio_layer, io) = SocketIo::builder().build_layer();
    let state = Arc::new(AppState {
        db: db.clone(),
        config: AppConfig {
            jwt_secret: SECRET.to_string(),
            ..AppConfig::default()
        },
        io,
        notifier: Notifier::new(db, PushClient::recording()),
        rate_limiter: RateLimiter::local(RatePolicy::default()),
        metrics_handle: None,
    });
    attach_socket_handlers(state.clone());
    let app = router(state.clone(), sio_layer);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener address").to_string();
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve test app") });
    (addr, state)
}

pub fn token(user_id: Uuid, role: UserRole, ttl_secs: i64) -> String {
    let claims = Claims::new(user_id, role, ttl_secs);
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).expect("sign token")
}

pub fn insert_user(conn: &mut PgConnection, role: UserRole) -> Uuid {
    let id = Uuid::new_v4();
    diesel::insert_into(users::table)
        .values((
            users::id.eq(id),
            users::name.eq(format!("{role} {}", &id.to_string()[..8])),
            users::email.eq(format!("{id}@test.voluntr")),
            users::role.eq(role.as_str()),
        ))
        .execute(conn)
        .expect("insert user");
    id
}

pub fn auth(id: Uuid, role: UserRole) -> AuthUser {
    AuthUser {
        id,
        role,
        token_id: Uuid::new_v4(),
        expires_at: i64::MAX,
    }
}

/// Open unpaid event tomorrow, 09:00 to 17:00.
pub fn tomorrow_event(conn: &mut PgConnection, organiser_id: Uuid, status: EventStatus) -> Event {
    let tomorrow = Utc::now().date_naive() + chrono::Duration::days(1);
    let input = EventInput {
        title: Some("Beach clean-up".into()),
        location: Some("North shore".into()),
        event_date: Some(tomorrow),
        end_date: Some(tomorrow),
        start_time: NaiveTime::from_hms_opt(9, 0, 0),
        end_time: NaiveTime::from_hms_opt(17, 0, 0),
        event_type: Some(EventType::Unpaid),
        volunteers_required: Some(10),
        application_deadline: Some(tomorrow),
        status: Some(status),
        ..Default::default()
    };
    events::create_event(conn, organiser_id, input).expect("create event")
}
