use std::sync::Arc;
use std::time::{Duration, Instant};

use socketioxide::SocketIo;

use voluntr_api::config::{AppConfig, RateLimitBackend};
use voluntr_api::services::notifications::Notifier;
use voluntr_api::services::rate_limiter::{RateLimiter, RatePolicy};
use voluntr_api::{attach_socket_handlers, router, AppState};
use voluntr_shared::clients::db::create_pool;
use voluntr_shared::clients::push::PushClient;
use voluntr_shared::clients::redis::RedisClient;

const RATE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    voluntr_shared::middleware::init_tracing("voluntr-api");

    let config = AppConfig::load()?;
    let port = config.port;

    // HTTP extractors read the secret from the environment.
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    let metrics_handle = voluntr_shared::middleware::init_metrics()?;
    let db = create_pool(&config.database_url, config.db_pool_size)?;

    let push = match config.fcm_service_account()? {
        Some(key) => PushClient::fcm(&config.fcm_endpoint, key)?,
        None => {
            tracing::warn!("FCM credentials not configured, push notifications disabled");
            PushClient::disabled()
        }
    };
    let notifier = Notifier::new(db.clone(), push);

    let policy = RatePolicy::from_config(&config);
    let rate_limiter = match config.rate_limit_backend {
        RateLimitBackend::Redis => {
            let redis = RedisClient::connect(&config.redis_url).await?;
            tracing::info!("chat rate limiter backed by redis");
            RateLimiter::redis(redis, policy)
        }
        RateLimitBackend::Memory => RateLimiter::local(policy),
    };

    if let RateLimiter::Local(limiter) = &rate_limiter {
        let limiter = limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let removed = limiter.sweep_idle(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, tracked = limiter.tracked_users(), "swept idle rate limit entries");
                }
            }
        });
    }

    // io lives in AppState so REST handlers can broadcast to thread rooms
    let (sio_layer, io) = SocketIo::builder().build_layer();

    let state = Arc::new(AppState {
        db,
        config,
        io,
        notifier,
        rate_limiter,
        metrics_handle: Some(metrics_handle),
    });

    attach_socket_handlers(state.clone());
    let app = router(state, sio_layer);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "voluntr-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
