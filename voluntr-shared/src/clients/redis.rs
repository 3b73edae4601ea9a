use redis::aio::ConnectionManager;
use redis::Script;

/// KEYS[1] window counter, KEYS[2] cooldown flag.
/// ARGV[1] max per window, ARGV[2] window secs, ARGV[3] cooldown secs.
const BUDGET_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 1 then
  return 0
end
local n = redis.call('INCR', KEYS[1])
if n == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
if n > tonumber(ARGV[1]) then
  redis.call('SET', KEYS[2], '1', 'EX', ARGV[3])
  redis.call('DEL', KEYS[1])
  return 0
end
return 1
"#;

/// Per-user message budgets shared by every API instance.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    budget: Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_per_window: u32,
    pub window_secs: u64,
    pub cooldown_secs: u64,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!(url = %url, "connected to Redis");
        Ok(Self {
            conn,
            budget: Script::new(BUDGET_SCRIPT),
        })
    }

    /// Spends one unit of `subject`'s budget. Over-budget subjects start a cooldown
    /// during which every call returns `false`.
    pub async fn consume_budget(&self, subject: &str, budget: Budget) -> Result<bool, redis::RedisError> {
        let mut conn = self.conn.clone();
        let allowed: i64 = self
            .budget
            .key(format!("{subject}:window"))
            .key(format!("{subject}:cooldown"))
            .arg(budget.max_per_window)
            .arg(budget.window_secs.max(1))
            .arg(budget.cooldown_secs.max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(allowed == 1)
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs only when `VOLUNTR_TEST_REDIS_URL` points at a disposable Redis.
    async fn client() -> Option<RedisClient> {
        let url = std::env::var("VOLUNTR_TEST_REDIS_URL").ok()?;
        Some(RedisClient::connect(&url).await.expect("connect to test redis"))
    }

    #[tokio::test]
    async fn budget_trips_into_cooldown() {
        let Some(client) = client().await else { return };
        let subject = format!("test:{}", uuid::Uuid::new_v4());
        let budget = Budget {
            max_per_window: 3,
            window_secs: 60,
            cooldown_secs: 60,
        };

        for i in 0..3 {
            assert!(client.consume_budget(&subject, budget).await.unwrap(), "message {i}");
        }
        assert!(!client.consume_budget(&subject, budget).await.unwrap());
        // Counter was reset but the cooldown still holds.
        assert!(!client.consume_budget(&subject, budget).await.unwrap());
    }
}
