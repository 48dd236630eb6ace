use std::time::Duration;

use anyhow::Context as _;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const DEFAULT_SETTINGS_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
enum CacheBackend {
    Disabled,
    Redis(Pool),
}

/// Optional JSON cache in front of the datastore.
///
/// The disabled backend never stores anything, so every read falls through
/// to the loader.
#[derive(Clone, Debug)]
pub struct CacheService {
    key_prefix: String,
    ttl: Duration,
    backend: CacheBackend,
}

impl CacheService {
    pub fn disabled(prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: prefix.into(),
            ttl: DEFAULT_SETTINGS_CACHE_TTL,
            backend: CacheBackend::Disabled,
        }
    }

    pub fn redis(redis_url: &str, prefix: impl Into<String>) -> anyhow::Result<Self> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .context("failed to create redis pool")?;

        Ok(Self {
            key_prefix: prefix.into(),
            ttl: DEFAULT_SETTINGS_CACHE_TTL,
            backend: CacheBackend::Redis(pool),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_redis_enabled(&self) -> bool {
        matches!(self.backend, CacheBackend::Redis(_))
    }

    pub fn key(&self, suffix: impl AsRef<str>) -> String {
        format!("{}:{}", self.key_prefix, suffix.as_ref())
    }

    pub fn setting_key(&self, guild_id: u64, key: &str) -> String {
        self.key(format!("settings:{guild_id}:{key}"))
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        let CacheBackend::Redis(pool) = &self.backend else {
            return Ok(());
        };

        let mut conn = pool.get().await.context("failed to get redis connection")?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("redis PING failed")?;

        Ok(())
    }

    pub async fn get_json<T>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let CacheBackend::Redis(pool) = &self.backend else {
            return Ok(None);
        };

        let mut conn = pool.get().await.context("failed to get redis connection")?;
        let bytes: Option<Vec<u8>> = conn
            .get(key)
            .await
            .with_context(|| format!("redis GET failed for key `{key}`"))?;

        bytes
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .with_context(|| format!("failed to deserialize cache value for `{key}`"))
    }

    pub async fn set_json<T>(&self, key: &str, value: &T) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        let CacheBackend::Redis(pool) = &self.backend else {
            return Ok(());
        };

        let payload = serde_json::to_vec(value)
            .with_context(|| format!("failed to serialize cache value for `{key}`"))?;
        let ttl_seconds = self.ttl.as_secs().max(1);

        let mut conn = pool.get().await.context("failed to get redis connection")?;
        conn.set_ex::<_, _, ()>(key, payload, ttl_seconds)
            .await
            .with_context(|| format!("redis SETEX failed for key `{key}`"))?;

        Ok(())
    }

    pub async fn del(&self, key: &str) -> anyhow::Result<()> {
        let CacheBackend::Redis(pool) = &self.backend else {
            return Ok(());
        };

        let mut conn = pool.get().await.context("failed to get redis connection")?;
        conn.del::<_, u64>(key)
            .await
            .with_context(|| format!("redis DEL failed for key `{key}`"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_keys_are_prefixed_per_guild() {
        let cache = CacheService::disabled("waffle:test");
        assert_eq!(
            cache.setting_key(42, "mute_role"),
            "waffle:test:settings:42:mute_role"
        );
        assert!(!cache.is_redis_enabled());
    }

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let cache = CacheService::disabled("waffle:test");
        cache.set_json("k", &Some("v".to_owned())).await.unwrap();

        let cached: Option<Option<String>> = cache.get_json("k").await.unwrap();
        assert!(cached.is_none());
        cache.del("k").await.unwrap();
        cache.ping().await.unwrap();
    }
}
