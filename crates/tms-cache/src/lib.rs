//! # TMS Cache
//!
//! 엔티티 조회 결과와 발급 토큰 상태를 보관하는 캐시 레이어입니다.
//!
//! 캐시는 최적화 계층일 뿐이며 장애가 호출자에게 전파되지 않습니다.
//! [`Cache`] 파사드는 모든 백엔드 에러를 로그로 남기고 "없음"으로 처리합니다.
//!
//! # 구성 요소
//!
//! - [`CacheStore`]: 백엔드가 구현하는 최소 인터페이스
//! - [`RedisCache`]: Redis 백엔드 (타임아웃, 재연결, circuit breaker)
//! - [`MemoryCache`]: 프로세스 내 백엔드 (테스트, Redis 비활성화 시)
//! - [`Cache`]: JSON 직렬화와 fail-soft 처리를 담당하는 파사드
//! - [`keys`]: 키 네임스페이스와 TTL

pub mod breaker;
pub mod cache;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_cache;
pub mod store;

pub use breaker::{CircuitBreaker, CircuitState};
pub use cache::Cache;
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;
pub use store::CacheStore;
