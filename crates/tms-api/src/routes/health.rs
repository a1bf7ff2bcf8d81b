//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템(Kubernetes 등)에서 사용됩니다.
//! 같은 점검 로직을 RPC `health.*` 패턴도 사용합니다.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

use crate::state::AppState;

/// 전체 서비스 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    /// 캐시 또는 TMS 백엔드 장애 (트래픽은 계속 처리)
    Degraded,
    /// 데이터베이스 장애
    Unhealthy,
}

/// 헬스 체크 응답 구조체.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: ServiceHealth,

    /// API 버전
    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: i64,

    /// 현재 시간 (ISO 8601)
    pub timestamp: String,

    pub components: ComponentHealth,
}

impl HealthResponse {
    /// 트래픽을 받을 수 있는 상태인지 (데이터베이스 정상).
    pub fn is_ready(&self) -> bool {
        self.status != ServiceHealth::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub database: ComponentStatus,
    pub cache: ComponentStatus,
    pub tms_backend: ComponentStatus,
}

/// 컴포넌트 상태 값.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Up,
    Down,
    NotConfigured,
}

/// 컴포넌트 점검 결과.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub status: ComponentState,

    /// 백엔드 이름이나 실패 사유
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn up() -> Self {
        Self {
            status: ComponentState::Up,
            message: None,
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: ComponentState::Down,
            message: Some(message.into()),
        }
    }

    pub fn not_configured() -> Self {
        Self {
            status: ComponentState::NotConfigured,
            message: None,
        }
    }

    pub fn up_with_info(message: impl Into<String>) -> Self {
        Self {
            status: ComponentState::Up,
            message: Some(message.into()),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == ComponentState::Up
    }
}

/// liveness 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LivenessResponse {
    pub status: String,
    pub timestamp: String,
}

impl LivenessResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ==================== 점검 ====================

/// 캐시 왕복 점검.
pub async fn cache_status(state: &AppState) -> ComponentStatus {
    let backend = state.cache.backend();
    if state.cache.health_check().await {
        ComponentStatus::up_with_info(backend)
    } else {
        ComponentStatus::down(format!("{} 응답 없음", backend))
    }
}

/// 데이터베이스 점검.
pub async fn database_status(state: &AppState) -> ComponentStatus {
    match &state.db {
        Some(db) if db.ping().await => ComponentStatus::up(),
        Some(_) => ComponentStatus::down("연결 실패"),
        None => ComponentStatus::not_configured(),
    }
}

/// TMS 백엔드 점검. 실패는 경고 로그만 남깁니다.
pub async fn tms_backend_status(state: &AppState) -> ComponentStatus {
    let Some(backend) = &state.tms_backend else {
        return ComponentStatus::not_configured();
    };

    match backend.check_health().await {
        Ok(()) => ComponentStatus::up(),
        Err(e) => {
            warn!(url = backend.health_url(), error = %e, "TMS backend health check failed");
            ComponentStatus::down("TMS 백엔드 연결 실패")
        }
    }
}

/// 전체 점검.
///
/// 데이터베이스 장애는 `unhealthy`, 캐시나 TMS 백엔드 장애는 `degraded`입니다.
/// 캐시가 없어도 서비스는 저장소로 직접 동작합니다.
pub async fn health_report(state: &AppState) -> HealthResponse {
    let (database, cache, tms_backend) = tokio::join!(
        database_status(state),
        cache_status(state),
        tms_backend_status(state)
    );

    let status = if database.status == ComponentState::Down {
        ServiceHealth::Unhealthy
    } else if !cache.is_up() || tms_backend.status == ComponentState::Down {
        ServiceHealth::Degraded
    } else {
        ServiceHealth::Healthy
    };

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth {
            database,
            cache,
            tms_backend,
        },
    }
}

// ==================== 핸들러 ====================

/// 간단한 헬스 체크 (liveness 확인용).
///
/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "서버 응답 가능", body = LivenessResponse)),
    tag = "health"
)]
pub async fn health_check() -> impl IntoResponse {
    Json(LivenessResponse::ok())
}

/// 상세 헬스 체크 (readiness 확인용).
///
/// GET /health/ready
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "트래픽 처리 가능", body = HealthResponse),
        (status = 503, description = "데이터베이스 장애", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = health_report(&state).await;
    let status_code = if report.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(report))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use crate::state::create_test_state;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        let app = Router::new().route("/health", get(health_check));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_returns_json() {
        let state = Arc::new(create_test_state(Arc::new(MemoryStore::new())));
        let app = Router::new()
            .route("/health/ready", get(health_ready))
            .with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(health.status, ServiceHealth::Healthy);
        assert_eq!(
            health.components.database.status,
            ComponentState::NotConfigured
        );
        assert_eq!(health.components.cache.message.as_deref(), Some("memory"));
        assert_eq!(
            health.components.tms_backend.status,
            ComponentState::NotConfigured
        );
    }

    #[test]
    fn test_component_status_variants() {
        assert!(ComponentStatus::up().is_up());
        assert!(ComponentStatus::up_with_info("redis").is_up());

        let down = ComponentStatus::down("timeout");
        assert!(!down.is_up());
        assert_eq!(down.message.as_deref(), Some("timeout"));

        let json = serde_json::to_value(ComponentStatus::not_configured()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "not_configured" }));
    }
}
