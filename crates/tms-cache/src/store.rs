//! 캐시 백엔드 인터페이스.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheResult;

/// 캐시 백엔드가 구현해야 하는 최소 작업 집합.
///
/// 값은 직렬화된 문자열입니다. 타입 변환과 fail-soft 처리는
/// [`crate::Cache`]가 담당하므로 구현체는 에러를 그대로 반환합니다.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 백엔드 이름 (로그/메트릭 라벨).
    fn backend(&self) -> &'static str;

    /// 키 조회. 없거나 만료되었으면 `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// 키 저장. `ttl`이 `None`이면 만료 없음.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// 키 삭제. 실제로 삭제되었으면 `true`.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// 접두사로 시작하는 모든 키 삭제. 삭제된 키 수를 반환합니다.
    async fn delete_by_prefix(&self, prefix: &str) -> CacheResult<usize>;

    /// 짧은 TTL의 임시 키로 쓰기 후 읽기를 확인합니다.
    async fn health_check(&self) -> CacheResult<bool>;
}
