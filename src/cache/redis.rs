//! Redis-backed validation cache.
//!
//! Each code is stored as `gate-pass:code:{code}` → `"PAID" | "USED" | ...`
//! with `SET EX`, so Redis handles expiry. Connection pooling and
//! reconnection come from [`ConnectionManager`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::{CacheError, CacheState, ValidationCache};
use crate::domain::RedemptionCode;

/// Shared Redis validation cache.
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
    ttl_secs: u64,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connects to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the URL is invalid or the
    /// initial connection fails.
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Unavailable(format!("redis connection failed: {e}")))?;
        Ok(Self {
            conn_manager,
            ttl_secs: ttl.as_secs().max(1),
        })
    }

    fn key(code: &RedemptionCode) -> String {
        format!("gate-pass:code:{code}")
    }
}

#[async_trait]
impl ValidationCache for RedisCache {
    async fn get(&self, code: &RedemptionCode) -> Result<CacheState, CacheError> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn
            .get(Self::key(code))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        value.map_or(Ok(CacheState::Unknown), |v| v.parse())
    }

    async fn set(&self, code: &RedemptionCode, state: CacheState) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .set_ex(Self::key(code), state.as_str(), self.ttl_secs)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn invalidate(&self, code: &RedemptionCode) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(Self::key(code))
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        let Ok(code) = RedemptionCode::parse("ABCDEF123456") else {
            return;
        };
        assert_eq!(RedisCache::key(&code), "gate-pass:code:ABCDEF123456");
    }

    #[tokio::test]
    async fn invalid_url_is_unavailable() {
        let result = RedisCache::connect("not-a-url", Duration::from_secs(60)).await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }
}
