//! Redis 캐시 백엔드.
//!
//! - 연결은 첫 사용 시 `ConnectionManager`로 생성되며, 끊기면 지수 backoff로 재연결합니다.
//! - 모든 명령은 `op_timeout` 안에 끝나야 하며, 초과 시 [`CacheError::Timeout`]입니다.
//! - 연속 실패가 임계치에 도달하면 cooldown 동안 명령을 보내지 않고
//!   [`CacheError::CircuitOpen`]을 반환합니다.
//! - 접두사 삭제는 `KEYS` 대신 `SCAN` 커서로 배치 단위 처리합니다.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tms_core::RedisConfig;
use tracing::info;

use crate::breaker::CircuitBreaker;
use crate::error::{CacheError, CacheResult};
use crate::keys;
use crate::store::CacheStore;

/// SCAN 한 번에 요청할 키 개수.
const SCAN_BATCH: usize = 100;

/// 재연결 backoff 지수 밑.
const BACKOFF_EXPONENT_BASE: u64 = 2;

/// Redis 연결 래퍼.
pub struct RedisCache {
    client: Client,
    connection: RwLock<Option<ConnectionManager>>,
    config: RedisConfig,
    breaker: CircuitBreaker,
}

impl RedisCache {
    /// 클라이언트를 생성합니다. 실제 연결은 첫 명령 시점에 맺습니다.
    ///
    /// URL 형식이 잘못된 경우에만 실패합니다.
    pub fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            config: config.clone(),
            breaker: CircuitBreaker::new("redis", config.failure_threshold, config.cooldown()),
        })
    }

    /// 백엔드 circuit breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut slot = self.connection.write().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        info!("Connecting to Redis...");
        let manager = ConnectionManager::new_with_backoff(
            self.client.clone(),
            BACKOFF_EXPONENT_BASE,
            self.config.retry_factor_ms,
            self.config.max_retries,
        )
        .await?;
        info!("Redis connection established");

        *slot = Some(manager.clone());
        Ok(manager)
    }

    /// 타임아웃과 circuit breaker를 적용해 명령을 실행합니다.
    async fn run<T, F, Fut>(&self, op: &'static str, command: F) -> CacheResult<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        if !self.breaker.is_allowed() {
            return Err(CacheError::CircuitOpen);
        }

        let outcome = tokio::time::timeout(self.config.op_timeout(), async {
            let conn = self.connection().await?;
            command(conn).await.map_err(CacheError::from)
        })
        .await
        .unwrap_or_else(|_| Err(CacheError::Timeout(op)));

        match &outcome {
            Err(e) if e.is_backend_failure() => self.breaker.record_failure(),
            _ => self.breaker.record_success(),
        }
        outcome
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.run("get", |mut conn| async move {
            conn.get::<_, Option<String>>(key).await
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        self.run("set", |mut conn| async move {
            match ttl {
                // Redis EX는 최소 1초
                Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await,
                None => conn.set::<_, _, ()>(key, value).await,
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.run("delete", |mut conn| async move {
            conn.del::<_, i64>(key).await.map(|n| n > 0)
        })
        .await
    }

    async fn delete_by_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let pattern = format!("{}*", escape_glob(prefix));

        self.run("delete_by_prefix", |mut conn| async move {
            let mut cursor: u64 = 0;
            let mut deleted: usize = 0;
            loop {
                let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut conn)
                    .await?;

                if !batch.is_empty() {
                    let removed: usize = conn.del(&batch).await?;
                    deleted += removed;
                }
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            Ok::<_, redis::RedisError>(deleted)
        })
        .await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let key = keys::health_check(uuid::Uuid::new_v4());

        self.run("health_check", |mut conn| async move {
            conn.set_ex::<_, _, ()>(&key, "ok", keys::HEALTH_CHECK_TTL.as_secs())
                .await?;
            let value: Option<String> = conn.get(&key).await?;
            conn.del::<_, i64>(&key).await?;
            Ok::<_, redis::RedisError>(value.as_deref() == Some("ok"))
        })
        .await
    }
}

/// Redis glob 메타 문자를 이스케이프합니다.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;

    fn unreachable_config() -> RedisConfig {
        RedisConfig {
            url: "redis://127.0.0.1:1/0".to_string(),
            op_timeout_ms: 300,
            max_retries: 0,
            retry_factor_ms: 10,
            failure_threshold: 2,
            cooldown_secs: 60,
            ..Default::default()
        }
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("users:"), "users:");
        assert_eq!(escape_glob("odd*[key]?"), "odd\\*\\[key\\]\\?");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
            ..Default::default()
        };
        assert!(RedisCache::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_trips_breaker() {
        let cache = RedisCache::new(&unreachable_config()).unwrap();

        for _ in 0..2 {
            let err = cache.get("users:1").await.unwrap_err();
            assert!(err.is_backend_failure(), "unexpected error: {err}");
        }

        assert_eq!(cache.breaker().state(), CircuitState::Open);
        assert!(matches!(
            cache.get("users:1").await,
            Err(CacheError::CircuitOpen)
        ));
    }
}
