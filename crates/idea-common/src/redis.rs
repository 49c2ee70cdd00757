/// Redis-backed key-value storage.
///
/// Unlike a cache, the history written here is the system of record, so failures are
/// returned to the caller instead of degrading to no-ops. Every failure is still logged
/// at `warn` with the key involved.
use redis::AsyncCommands;
use tracing::warn;

use crate::error::CommonError;

#[derive(Clone)]
pub struct RedisCache {
    client: Option<redis::Client>,
}

impl RedisCache {
    /// Attempt to create a client. If the URL is `None` or invalid, every operation
    /// fails with [`CommonError::RedisUnavailable`].
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "failed to create redis client"))
                .ok()
        });
        Self { client }
    }

    /// Test the connection by sending a PING. Returns `true` if Redis is reachable.
    pub async fn is_available(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    /// Get a value. `Ok(None)` means the key does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))?;
        Ok(value)
    }

    /// Set a value with no expiry. A single `SET` replaces the whole value atomically.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), CommonError> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, value)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis SET failed"))?;
        Ok(())
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CommonError> {
        let client = self.client.as_ref().ok_or(CommonError::RedisUnavailable)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))?;
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn without_url_every_operation_reports_unavailable() {
        let cache = RedisCache::new(None);
        assert!(!cache.is_available().await);
        assert!(matches!(
            cache.get("k").await,
            Err(CommonError::RedisUnavailable)
        ));
        assert!(matches!(
            cache.set("k", "v").await,
            Err(CommonError::RedisUnavailable)
        ));
    }
}
