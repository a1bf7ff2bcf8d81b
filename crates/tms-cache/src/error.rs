//! 캐시 에러 타입.
//!
//! 이 에러는 [`crate::Cache`] 파사드 밖으로 나가지 않습니다.

use thiserror::Error;

/// 캐시 백엔드 에러.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis 명령 실패
    #[error("Redis 에러: {0}")]
    Redis(#[from] redis::RedisError),

    /// 명령 타임아웃
    #[error("캐시 작업 타임아웃: {0}")]
    Timeout(&'static str),

    /// 연속 실패로 캐시를 우회하는 중
    #[error("캐시 우회 중 (circuit open)")]
    CircuitOpen,

    /// 값 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// 백엔드 장애로 볼 에러인지 확인합니다.
    ///
    /// circuit breaker는 이 에러만 실패로 집계합니다.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, CacheError::Redis(_) | CacheError::Timeout(_))
    }
}

/// 캐시 작업 Result 타입.
pub type CacheResult<T> = Result<T, CacheError>;
