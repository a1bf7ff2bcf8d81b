//! TMS 인증/업무 미들웨어 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API
//! - 줄 단위 JSON TCP RPC 서버
//! - JWT 인증, 토큰 폐기, 작업별 권한 가드
//! - 사용자/역할/주문 서비스 (캐시 read-through + 접두사 무효화)
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`rpc`]: TCP RPC 서버와 패턴 디스패처
//! - [`auth`]: JWT, 비밀번호 해시, 접근 정책, 토큰 서비스
//! - [`backend`]: TMS 백엔드 HTTP 클라이언트 (헬스 체크)
//! - [`services`]: 전송 계층과 무관한 도메인 서비스
//! - [`repository`]: 저장소 트레이트와 PostgreSQL/메모리 구현
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod backend;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod rpc;
pub mod services;
pub mod state;

pub use auth::{AccessPolicy, Claims, JwtAuth, Operation, TokenService};
pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::create_api_router;
pub use rpc::{RpcDispatcher, RpcRequest, RpcResponse, RpcServer};
pub use state::{AppState, Stores};

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
