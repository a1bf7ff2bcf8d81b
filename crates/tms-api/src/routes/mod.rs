//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `{prefix}/auth` - 로그인, 토큰 갱신, 로그아웃, 프로필
//! - `{prefix}/users` - 사용자 관리
//! - `{prefix}/roles` - 역할 및 권한 관리
//! - `{prefix}/orders` - 운송 주문 관리
//!
//! `prefix`는 설정(`server.api_prefix`)에서 읽으며 기본값은 `/api`입니다.

pub mod auth;
pub mod health;
pub mod orders;
pub mod roles;
pub mod users;

pub use auth::auth_router;
pub use health::{
    cache_status, health_report, health_router, ComponentHealth, ComponentState, ComponentStatus,
    HealthResponse, LivenessResponse, ServiceHealth,
};
pub use orders::orders_router;
pub use roles::roles_router;
pub use users::users_router;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 모든 서브 라우터를 조합하여 하나의 라우터로 반환합니다.
pub fn create_api_router(api_prefix: &str) -> Router<Arc<AppState>> {
    let prefix = api_prefix.trim_end_matches('/');

    Router::new()
        // 헬스 체크 엔드포인트
        .nest("/health", health_router())
        // 도메인 엔드포인트
        .nest(&format!("{prefix}/auth"), auth_router())
        .nest(&format!("{prefix}/users"), users_router())
        .nest(&format!("{prefix}/roles"), roles_router())
        .nest(&format!("{prefix}/orders"), orders_router())
}
