//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use tms_core::{
    Address, Order, OrderStatus, PaymentStatus, Role, RoleSummary, User, UserSummary,
};

use crate::auth::TokenPair;
use crate::error::ApiErrorResponse;
use crate::routes::{
    ComponentHealth, ComponentState, ComponentStatus, HealthResponse, LivenessResponse, ServiceHealth,
};
use crate::services::{
    AddressDto, ChangePasswordDto, CreateOrderDto, CreateRoleDto, CreateUserDto, LoginDto,
    LoginResponse, MessageResponse, PermissionsDto, RefreshTokenDto, SetStatusDto,
    UpdateOrderStatusDto, UpdatePaymentStatusDto, UpdateRoleDto, UpdateUserDto, UserProfile,
    ValidateResponse,
};

// ==================== OpenAPI 문서 정의 ====================

/// TMS API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TMS Middleware API",
        version = "0.1.0",
        description = r#"
# TMS 인증/업무 미들웨어 REST API

운송 관리 시스템의 인증, 사용자/역할 관리, 주문 관리를 위한 REST API입니다.
같은 기능이 TCP RPC(`auth.*`, `user.*`, `role.*`, `order.*`, `health.*`)로도 제공됩니다.

## 인증

로그인과 토큰 갱신을 제외한 엔드포인트는 JWT Bearer 토큰이 필요합니다.
`Authorization: Bearer <token>` 헤더를 포함하세요.
"#
    ),
    servers(
        (url = "http://localhost:3020", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 로그인, 토큰 갱신/폐기, 프로필"),
        (name = "users", description = "사용자 - 계정 CRUD 및 역할 할당"),
        (name = "roles", description = "역할 - 역할 CRUD 및 권한 관리"),
        (name = "orders", description = "주문 - 운송 주문 및 상태 전이")
    ),
    modifiers(&SecurityAddon),
    // ==================== 스키마 등록 ====================
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ServiceHealth,
            ComponentHealth,
            ComponentState,
            ComponentStatus,
            LivenessResponse,

            // ===== Common =====
            ApiErrorResponse,
            MessageResponse,

            // ===== Auth =====
            LoginDto,
            RefreshTokenDto,
            ChangePasswordDto,
            LoginResponse,
            TokenPair,
            UserProfile,
            ValidateResponse,

            // ===== Users =====
            User,
            UserSummary,
            CreateUserDto,
            UpdateUserDto,
            SetStatusDto,

            // ===== Roles =====
            Role,
            RoleSummary,
            CreateRoleDto,
            UpdateRoleDto,
            PermissionsDto,

            // ===== Orders =====
            Order,
            Address,
            OrderStatus,
            PaymentStatus,
            AddressDto,
            CreateOrderDto,
            UpdateOrderStatusDto,
            UpdatePaymentStatusDto,
        )
    ),
    // ==================== 경로 등록 ====================
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::auth::profile,
        crate::routes::auth::validate,
        crate::routes::auth::change_password,

        // ===== Users =====
        crate::routes::users::create_user,
        crate::routes::users::list_users,
        crate::routes::users::get_user,
        crate::routes::users::get_user_by_email,
        crate::routes::users::list_users_by_role,
        crate::routes::users::update_user,
        crate::routes::users::delete_user,
        crate::routes::users::get_user_permissions,
        crate::routes::users::set_user_status,

        // ===== Roles =====
        crate::routes::roles::create_role,
        crate::routes::roles::list_roles,
        crate::routes::roles::list_all_permissions,
        crate::routes::roles::list_roles_by_permission,
        crate::routes::roles::get_role_by_name,
        crate::routes::roles::get_role,
        crate::routes::roles::update_role,
        crate::routes::roles::delete_role,
        crate::routes::roles::add_permissions,
        crate::routes::roles::remove_permissions,
        crate::routes::roles::set_permissions,
        crate::routes::roles::list_role_users,

        // ===== Orders =====
        crate::routes::orders::create_order,
        crate::routes::orders::list_orders,
        crate::routes::orders::get_order,
        crate::routes::orders::update_order_status,
        crate::routes::orders::update_payment_status,
        crate::routes::orders::delete_order,
    )
)]
pub struct ApiDoc;

/// `bearer_auth` 보안 스키마 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

// ==================== Swagger UI 라우터 ====================

/// Swagger UI 라우터 생성.
///
/// 다음 경로에 문서 UI를 마운트합니다:
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

// ==================== 테스트 ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_valid() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&spec).unwrap();

        assert!(json.contains("TMS Middleware API"));

        // 태그 확인
        assert!(json.contains("health"));
        assert!(json.contains("auth"));
        assert!(json.contains("orders"));

        // 경로 확인
        assert!(json.contains("/health/ready"));
        assert!(json.contains("/api/auth/login"));
        assert!(json.contains("/api/roles/{id}/permissions"));
        assert!(json.contains("/api/orders/{id}/payment"));
    }

    #[test]
    fn test_openapi_registers_bearer_scheme() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).unwrap();

        assert!(json.contains("bearer_auth"));
        assert!(json.contains("JWT"));
    }

    #[test]
    fn test_swagger_ui_router_creates() {
        let _router: Router<()> = swagger_ui_router();
    }

    #[test]
    fn test_openapi_contains_schemas() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).unwrap();

        assert!(json.contains("HealthResponse"));
        assert!(json.contains("ApiErrorResponse"));
        assert!(json.contains("CreateOrderDto"));
        assert!(json.contains("UserSummary"));
    }
}
