use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;
use voluntr_shared::clients::redis::{Budget, RedisClient};

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    pub max_messages: u32,
    pub window: Duration,
    pub cooldown: Duration,
}

impl RatePolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_messages: config.chat_rate_max,
            window: Duration::from_secs(config.chat_rate_window_secs),
            cooldown: Duration::from_secs(config.chat_cooldown_secs),
        }
    }
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            max_messages: 20,
            window: Duration::from_secs(10),
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Per-user message budget for the socket send path.
#[derive(Clone)]
pub enum RateLimiter {
    Local(std::sync::Arc<LocalRateLimiter>),
    Redis(RedisRateLimiter),
}

impl RateLimiter {
    pub fn local(policy: RatePolicy) -> Self {
        Self::Local(std::sync::Arc::new(LocalRateLimiter::new(policy)))
    }

    pub fn redis(client: RedisClient, policy: RatePolicy) -> Self {
        Self::Redis(RedisRateLimiter { client, policy })
    }

    /// Returns `false` when the user is over budget or cooling down.
    pub async fn try_consume(&self, user_id: Uuid) -> bool {
        match self {
            Self::Local(limiter) => limiter.try_consume_at(user_id, Instant::now()),
            Self::Redis(limiter) => limiter.try_consume(user_id).await,
        }
    }

    pub fn redis_client(&self) -> Option<&RedisClient> {
        match self {
            Self::Local(_) => None,
            Self::Redis(limiter) => Some(&limiter.client),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateState {
    window_start: Instant,
    count: u32,
    cooldown_until: Option<Instant>,
}

/// Counters live in this process only; each instance enforces its own budget.
pub struct LocalRateLimiter {
    policy: RatePolicy,
    entries: DashMap<Uuid, RateState>,
}

impl LocalRateLimiter {
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            policy,
            entries: DashMap::new(),
        }
    }

    pub fn try_consume_at(&self, user_id: Uuid, now: Instant) -> bool {
        let mut state = self.entries.entry(user_id).or_insert(RateState {
            window_start: now,
            count: 0,
            cooldown_until: None,
        });

        if let Some(until) = state.cooldown_until {
            if now < until {
                return false;
            }
            // Cooldown served: start from a fresh window.
            state.cooldown_until = None;
            state.window_start = now;
            state.count = 0;
        }

        if now.duration_since(state.window_start) > self.policy.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count >= self.policy.max_messages {
            state.cooldown_until = Some(now + self.policy.cooldown);
            return false;
        }

        state.count += 1;
        true
    }

    /// Drops users whose window and cooldown have both lapsed.
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let before = self.entries.len();
        let window = self.policy.window;
        self.entries.retain(|_, state| {
            let cooling = state.cooldown_until.is_some_and(|until| now < until);
            cooling || now.duration_since(state.window_start) <= window
        });
        before - self.entries.len()
    }

    pub fn tracked_users(&self) -> usize {
        self.entries.len()
    }
}

/// Shared counters so every instance sees the same budget.
#[derive(Clone)]
pub struct RedisRateLimiter {
    client: RedisClient,
    policy: RatePolicy,
}

impl RedisRateLimiter {
    async fn try_consume(&self, user_id: Uuid) -> bool {
        match self.check(user_id).await {
            Ok(allowed) => allowed,
            Err(e) => {
                // Chat stays available while Redis is down.
                tracing::warn!(error = %e, user_id = %user_id, "rate limit check failed, allowing message");
                true
            }
        }
    }

    async fn check(&self, user_id: Uuid) -> Result<bool, redis::RedisError> {
        let budget = Budget {
            max_per_window: self.policy.max_messages,
            window_secs: self.policy.window.as_secs(),
            cooldown_secs: self.policy.cooldown.as_secs(),
        };
        self.client.consume_budget(&format!("chat:{user_id}"), budget).await
    }
}
