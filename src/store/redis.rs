//! Redis-backed shared store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::{SharedStore, StoreError};

/// [`SharedStore`] over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with a `PING`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        info!(url = %url, "Connecting to Redis");

        let client = redis::Client::open(url)?;
        let mut manager = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut manager).await?;
        info!(response = %pong, "Redis connection established");

        Ok(Self { manager })
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        value.ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let applied: bool = conn.expire(key, seconds).await?;
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    fn unique_prefix() -> String {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("ratekeeper-test:{}:{}", std::process::id(), nanos)
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let err = RedisStore::connect("not-a-redis-url").await.err().unwrap();
        assert!(matches!(err, StoreError::Redis(_)));
    }

    #[tokio::test]
    #[ignore = "requires a Redis server at REDIS_URL"]
    async fn test_store_contract() {
        let store = RedisStore::connect(&redis_url()).await.unwrap();
        let prefix = unique_prefix();

        let missing = format!("{prefix}:missing");
        assert!(store.get(&missing).await.unwrap_err().is_not_found());
        assert!(!store.expire(&missing, Duration::from_secs(10)).await.unwrap());

        let counter = format!("{prefix}:counter");
        assert_eq!(store.incr(&counter).await.unwrap(), 1);
        assert_eq!(store.incr(&counter).await.unwrap(), 2);
        assert!(store.expire(&counter, Duration::from_secs(120)).await.unwrap());
        assert_eq!(store.get(&counter).await.unwrap(), b"2".to_vec());

        let document = format!("{prefix}:document");
        store.set(&document, br#"{"enabled":true}"#.to_vec()).await.unwrap();
        assert_eq!(store.get(&document).await.unwrap(), br#"{"enabled":true}"#.to_vec());
        assert!(store.expire(&document, Duration::from_secs(5)).await.unwrap());
    }
}
