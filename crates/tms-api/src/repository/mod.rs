//! 영속 저장소 계층.
//!
//! 서비스 계층은 이 모듈의 trait만 알고 있으며, 구현체는 두 가지입니다:
//! - [`postgres`]: PostgreSQL (sqlx) 구현
//! - [`memory`]: 프로세스 내 구현 (통합 테스트, 로컬 실행)
//!
//! 모든 메서드는 [`ServiceResult`]를 반환합니다. 드라이버 에러는
//! 구현체 내부에서 에러 분류로 변환되어 서비스 계층으로 새지 않습니다.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tms_core::{Address, Order, OrderStatus, PaymentStatus, Role, ServiceResult, User};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// 활성 관리자가 하나도 남지 않게 되는 변경의 거부 사유.
pub const LAST_ADMIN_MESSAGE: &str = "마지막 관리자 계정은 삭제하거나 비활성화할 수 없습니다";

// ==================== 입력 타입 ====================

/// 사용자 생성 입력.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub role_ids: Vec<Uuid>,
}

/// 사용자 부분 수정 입력. `None` 필드는 변경하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    /// 지정 시 역할 집합 전체를 교체
    pub role_ids: Option<Vec<Uuid>>,
}

/// 역할 생성 입력.
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

/// 역할 부분 수정 입력.
#[derive(Debug, Clone, Default)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<String>>,
}

/// 주문 생성 입력.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub pickup_address: Address,
    pub delivery_address: Address,
    pub total_amount: Decimal,
}

// ==================== 저장소 trait ====================

/// 사용자 저장소.
///
/// 조회 결과의 `User`는 항상 현재 역할 목록을 포함합니다.
///
/// `update`와 `delete`는 마지막 활성 관리자를 없애는 변경을 `Conflict`로
/// 거부합니다. 확인과 변경은 한 번에 일어나므로 동시에 들어온 두 요청이
/// 모두 통과할 수 없습니다.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>>;

    /// 이메일로 조회 (대소문자 무시).
    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>>;

    /// 로그인용 조회. 사용자와 비밀번호 해시를 함께 반환합니다.
    async fn find_credentials_by_email(&self, email: &str)
        -> ServiceResult<Option<(User, String)>>;

    async fn password_hash(&self, id: Uuid) -> ServiceResult<Option<String>>;

    async fn list(&self) -> ServiceResult<Vec<User>>;

    /// 역할 이름으로 보유자 조회 (대소문자 무시).
    async fn list_by_role_name(&self, role_name: &str, active_only: bool)
        -> ServiceResult<Vec<User>>;

    async fn list_by_role_id(&self, role_id: Uuid) -> ServiceResult<Vec<User>>;

    /// 생성. 이메일 중복 시 `AlreadyExists`, 없는 역할 ID는 `InvalidInput`.
    async fn insert(&self, user: NewUser) -> ServiceResult<User>;

    /// 부분 수정. 대상이 없으면 `None`.
    async fn update(&self, id: Uuid, changes: UserChanges) -> ServiceResult<Option<User>>;

    /// 삭제. 실제로 삭제되었으면 `true`.
    async fn delete(&self, id: Uuid) -> ServiceResult<bool>;

    /// `exclude`를 제외한 활성 관리자급 사용자 수.
    async fn count_other_active_admins(&self, exclude: Uuid) -> ServiceResult<i64>;

    /// 관리자급 역할을 가진 활성 사용자가 있는지 확인.
    async fn any_active_admin(&self) -> ServiceResult<bool>;
}

/// 역할 저장소.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Role>>;

    /// 이름으로 조회 (대소문자 무시).
    async fn find_by_name(&self, name: &str) -> ServiceResult<Option<Role>>;

    /// 여러 ID 조회. 존재하는 역할만 반환합니다.
    async fn find_many(&self, ids: &[Uuid]) -> ServiceResult<Vec<Role>>;

    async fn list(&self) -> ServiceResult<Vec<Role>>;

    async fn list_by_permission(&self, permission: &str) -> ServiceResult<Vec<Role>>;

    /// 생성. 이름 중복 시 `AlreadyExists`.
    async fn insert(&self, role: NewRole) -> ServiceResult<Role>;

    async fn update(&self, id: Uuid, changes: RoleChanges) -> ServiceResult<Option<Role>>;

    /// 삭제. 보유자가 남아 있으면 `Conflict`.
    async fn delete(&self, id: Uuid) -> ServiceResult<bool>;

    async fn member_count(&self, id: Uuid) -> ServiceResult<i64>;
}

/// 주문 저장소.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Order>>;

    async fn list(&self) -> ServiceResult<Vec<Order>>;

    async fn insert(&self, order: NewOrder) -> ServiceResult<Order>;

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> ServiceResult<Option<Order>>;

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> ServiceResult<Option<Order>>;

    async fn delete(&self, id: Uuid) -> ServiceResult<bool>;
}
