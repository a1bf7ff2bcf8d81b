//! Fail-soft 캐시 파사드.
//!
//! 서비스 계층은 이 타입만 사용합니다. 백엔드 에러는 여기서 흡수되어
//! 조회는 "없음", 쓰기/삭제는 no-op으로 처리되고 `warn` 로그만 남습니다.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tms_core::RedisConfig;
use tracing::{debug, error, warn};

use crate::error::CacheError;
use crate::memory::MemoryCache;
use crate::redis_cache::RedisCache;
use crate::store::CacheStore;

/// 타입 지정 캐시 핸들.
///
/// 복제 비용이 작으며 여러 서비스가 같은 백엔드를 공유합니다.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    /// 새 [`MemoryCache`] 위의 캐시.
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryCache::new()), default_ttl)
    }

    /// 설정에 따라 백엔드를 선택합니다.
    ///
    /// Redis 연결에 실패해도 에러를 반환하지 않습니다. 이후 명령에서
    /// 재연결을 시도하고, 그동안 캐시는 우회됩니다.
    pub async fn from_config(config: &RedisConfig) -> Self {
        if !config.enabled {
            warn!("Redis cache disabled, using in-process memory cache");
            return Self::in_memory(config.default_ttl());
        }

        let redis = match RedisCache::new(config) {
            Ok(redis) => redis,
            Err(e) => {
                error!(error = %e, "Invalid Redis configuration, using in-process memory cache");
                return Self::in_memory(config.default_ttl());
            }
        };

        match redis.health_check().await {
            Ok(true) => tracing::info!("Redis cache ready"),
            Ok(false) => warn!("Redis health check returned unexpected value"),
            Err(e) => warn!(
                error = %e,
                "Redis unavailable at startup, cache will be bypassed until it recovers"
            ),
        }

        Self::new(Arc::new(redis), config.default_ttl())
    }

    /// 백엔드 이름.
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// 기본 TTL.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // =========================================================================
    // 조회
    // =========================================================================

    /// JSON 값을 조회합니다.
    ///
    /// 역직렬화에 실패한 항목은 삭제하고 `None`을 반환합니다.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.record("miss");
                return None;
            }
            Err(e) => {
                self.absorb("get", key, &e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.record("hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable cache entry");
                self.record("miss");
                self.delete(key).await;
                None
            }
        }
    }

    /// 키가 존재하는지 확인합니다. 백엔드 에러 시 `false`.
    pub async fn contains(&self, key: &str) -> bool {
        match self.store.get(key).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                self.absorb("get", key, &e);
                false
            }
        }
    }

    /// 캐시 우선 조회.
    ///
    /// 캐시에 없으면 `load`를 호출하고, 성공한 결과만 `ttl`(없으면 기본 TTL)로 저장합니다.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get_json(key).await {
            return Ok(cached);
        }

        let value = load().await?;
        self.set_json(key, &value, ttl).await;
        Ok(value)
    }

    // =========================================================================
    // 쓰기 / 삭제
    // =========================================================================

    /// JSON 값을 저장합니다. `ttl`이 없으면 기본 TTL을 사용합니다.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                self.absorb("set", key, &CacheError::from(e));
                return;
            }
        };
        self.set_raw(key, &raw, ttl).await;
    }

    /// 문자열 값을 저장합니다.
    pub async fn set_raw(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return;
        }
        if let Err(e) = self.store.set(key, value, Some(ttl)).await {
            self.absorb("set", key, &e);
        }
    }

    /// 단일 키를 삭제합니다.
    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            self.absorb("delete", key, &e);
        }
    }

    /// 접두사 단위 무효화. 삭제된 키 수를 반환합니다 (실패 시 0).
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        match self.store.delete_by_prefix(prefix).await {
            Ok(deleted) => {
                debug!(prefix, deleted, "Cache prefix invalidated");
                deleted
            }
            Err(e) => {
                self.absorb("delete_by_prefix", prefix, &e);
                0
            }
        }
    }

    /// 쓰기 후 읽기로 백엔드 상태를 확인합니다.
    pub async fn health_check(&self) -> bool {
        match self.store.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(backend = self.backend(), error = %e, "Cache health check failed");
                false
            }
        }
    }

    fn record(&self, result: &'static str) {
        metrics::counter!(
            "tms_cache_requests_total",
            "backend" => self.backend(),
            "result" => result
        )
        .increment(1);
    }

    fn absorb(&self, op: &'static str, key: &str, err: &CacheError) {
        metrics::counter!(
            "tms_cache_errors_total",
            "backend" => self.backend(),
            "op" => op
        )
        .increment(1);

        // 우회 중에는 요청마다 로그를 남기지 않음
        if matches!(err, CacheError::CircuitOpen) {
            debug!(op, key, "Cache bypassed");
        } else {
            warn!(op, key, backend = self.backend(), error = %err, "Cache operation failed, continuing without cache");
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.backend())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheResult;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 모든 작업이 실패하는 백엔드.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        fn backend(&self) -> &'static str {
            "broken"
        }
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Timeout("get"))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> CacheResult<()> {
            Err(CacheError::Timeout("set"))
        }
        async fn delete(&self, _key: &str) -> CacheResult<bool> {
            Err(CacheError::Timeout("delete"))
        }
        async fn delete_by_prefix(&self, _prefix: &str) -> CacheResult<usize> {
            Err(CacheError::CircuitOpen)
        }
        async fn health_check(&self) -> CacheResult<bool> {
            Err(CacheError::Timeout("health_check"))
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: u32,
        name: String,
    }

    fn item() -> Item {
        Item {
            id: 7,
            name: "dispatcher".to_string(),
        }
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let cache = Cache::in_memory(Duration::from_secs(60));

        cache.set_json("roles:7", &item(), None).await;
        assert_eq!(cache.get_json::<Item>("roles:7").await, Some(item()));
        assert!(cache.contains("roles:7").await);

        cache.delete("roles:7").await;
        assert_eq!(cache.get_json::<Item>("roles:7").await, None);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_dropped() {
        let store = Arc::new(MemoryCache::new());
        let cache = Cache::new(store.clone(), Duration::from_secs(60));

        cache.set_raw("roles:7", "not json", None).await;
        assert_eq!(cache.get_json::<Item>("roles:7").await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_broken_backend_is_absorbed() {
        let cache = Cache::new(Arc::new(BrokenStore), Duration::from_secs(60));

        cache.set_json("users:1", &item(), None).await;
        assert_eq!(cache.get_json::<Item>("users:1").await, None);
        assert!(!cache.contains("users:1").await);
        assert_eq!(cache.invalidate_prefix("users:").await, 0);
        assert!(!cache.health_check().await);
    }

    #[tokio::test]
    async fn test_get_or_load_populates_once() {
        let cache = Cache::in_memory(Duration::from_secs(60));
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let loaded: Result<Item, String> = cache
                .get_or_load("roles:7", None, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(item())
                })
                .await;
            assert_eq!(loaded.unwrap(), item());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_load_does_not_cache_errors() {
        let cache = Cache::in_memory(Duration::from_secs(60));

        let failed: Result<Item, String> = cache
            .get_or_load("roles:404", None, || async { Err("not found".to_string()) })
            .await;
        assert!(failed.is_err());
        assert!(!cache.contains("roles:404").await);
    }

    #[tokio::test]
    async fn test_broken_backend_falls_through_to_loader() {
        let cache = Cache::new(Arc::new(BrokenStore), Duration::from_secs(60));

        let loaded: Result<Item, String> = cache
            .get_or_load("roles:7", None, || async { Ok(item()) })
            .await;
        assert_eq!(loaded.unwrap(), item());
    }
}
