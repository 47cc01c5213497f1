use std::collections::HashMap;
use std::sync::Arc;

use redis::aio::ConnectionManager;
use serde_json::Value;
use sketchdesk_domain::DomainResult;
use sketchdesk_domain::error::DomainError;
use sketchdesk_domain::ports::BoxFuture;
use sketchdesk_domain::ports::health::{HealthProbe, ProbeError};
use sketchdesk_domain::ports::sequence::ApplicationSequence;
use sketchdesk_domain::sequencer::ApplicationScope;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;
use tokio::sync::Mutex;

use super::surreal::{map_surreal_error, query_result};

const REDIS_BACKEND: &str = "redis";
const DEFAULT_REDIS_PREFIX: &str = "sketchdesk:application_seq";

#[derive(Default)]
pub struct InMemoryApplicationSequence {
    counters: Arc<Mutex<HashMap<String, u64>>>,
}

impl InMemoryApplicationSequence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationSequence for InMemoryApplicationSequence {
    fn next_value(&self, scope: &ApplicationScope, floor: u64) -> BoxFuture<'_, DomainResult<u64>> {
        let key = scope.key();
        let counters = self.counters.clone();
        Box::pin(async move {
            let mut counters = counters.lock().await;
            let counter = counters.entry(key).or_insert(0);
            *counter = (*counter).max(floor) + 1;
            Ok(*counter)
        })
    }
}

/// Counter record per scope, bumped with a single `UPSERT`.
pub struct SurrealApplicationSequence {
    client: Arc<Surreal<Client>>,
}

impl SurrealApplicationSequence {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }
}

impl ApplicationSequence for SurrealApplicationSequence {
    fn next_value(&self, scope: &ApplicationScope, floor: u64) -> BoxFuture<'_, DomainResult<u64>> {
        let client = self.client.clone();
        let key = scope.key();
        Box::pin(async move {
            let mut response = client
                .query(
                    "UPSERT type::thing('application_sequence', $key) \
                     SET last_value = math::max([last_value ?? 0, $floor]) + 1 \
                     RETURN last_value",
                )
                .bind(("key", key.clone()))
                .bind(("floor", floor as i64))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<Value> = response.take(0).map_err(query_result)?;
            rows.first()
                .and_then(|row| row.get("last_value"))
                .and_then(Value::as_u64)
                .ok_or_else(|| {
                    DomainError::Storage(format!("sequence upsert for {key} returned no value"))
                })
        })
    }
}

/// Redis counter; the Lua script raises the counter to `floor` and
/// increments it in one atomic step.
#[derive(Clone)]
pub struct RedisApplicationSequence {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisApplicationSequence {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        Self::connect_with_prefix(redis_url, DEFAULT_REDIS_PREFIX).await
    }

    pub async fn connect_with_prefix(
        redis_url: &str,
        prefix: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager,
            prefix: prefix.into(),
        })
    }
}

impl ApplicationSequence for RedisApplicationSequence {
    fn next_value(&self, scope: &ApplicationScope, floor: u64) -> BoxFuture<'_, DomainResult<u64>> {
        let mut conn = self.manager.clone();
        let key = format!("{}:{}", self.prefix, scope.key());
        Box::pin(async move {
            let script = redis::Script::new(
                r#"
                    local current = tonumber(redis.call('GET', KEYS[1]) or '0')
                    local floor = tonumber(ARGV[1])
                    if current < floor then
                        redis.call('SET', KEYS[1], floor)
                    end
                    return redis.call('INCR', KEYS[1])
                "#,
            );
            let next: u64 = script
                .key(&key)
                .arg(floor)
                .invoke_async(&mut conn)
                .await
                .map_err(|err| DomainError::Storage(format!("redis sequence failed: {err}")))?;
            Ok(next)
        })
    }
}

impl HealthProbe for RedisApplicationSequence {
    fn name(&self) -> &'static str {
        REDIS_BACKEND
    }

    fn probe(&self) -> BoxFuture<'_, Result<(), ProbeError>> {
        let mut conn = self.manager.clone();
        Box::pin(async move {
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|err| ProbeError::new(REDIS_BACKEND, err.to_string()))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_counter_respects_floor() {
        let sequence = InMemoryApplicationSequence::new();
        let scope = ApplicationScope::new("KA", "N", 26);
        assert_eq!(sequence.next_value(&scope, 0).await.unwrap(), 1);
        assert_eq!(sequence.next_value(&scope, 0).await.unwrap(), 2);
        assert_eq!(sequence.next_value(&scope, 41).await.unwrap(), 42);

        let other = ApplicationScope::new("KA", "S", 26);
        assert_eq!(sequence.next_value(&other, 0).await.unwrap(), 1);
    }
}
