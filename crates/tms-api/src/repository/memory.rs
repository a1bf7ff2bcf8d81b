//! 프로세스 내 저장소.
//!
//! PostgreSQL 구현과 같은 제약을 흉내냅니다:
//! - 이메일/역할 이름 고유성 (대소문자 무시)
//! - 없는 역할 할당 거부, 보유자가 있는 역할 삭제 거부
//! - 사용자 삭제 시 역할 연결 제거
//! - 마지막 활성 관리자 삭제/비활성화 거부 (쓰기 잠금 안에서 확인)
//!
//! 통합 테스트와 DB 없이 띄우는 로컬 실행에서 사용합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::RoundingStrategy;
use std::time::Duration;
use tokio::sync::RwLock;
use tms_core::{
    is_admin_class, Order, OrderStatus, PaymentStatus, Role, ServiceError, ServiceResult, User,
};
use uuid::Uuid;

use super::{
    NewOrder, NewRole, NewUser, OrderStore, RoleChanges, RoleStore, UserChanges, UserStore,
    LAST_ADMIN_MESSAGE,
};

#[derive(Debug, Clone)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    is_active: bool,
    role_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserRow>,
    roles: Vec<Role>,
    orders: Vec<Order>,
}

impl Tables {
    fn role_exists(&self, id: Uuid) -> bool {
        self.roles.iter().any(|r| r.id == id)
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except)
    }

    fn role_name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.roles
            .iter()
            .any(|r| r.name.eq_ignore_ascii_case(name) && Some(r.id) != except)
    }

    fn check_role_ids(&self, role_ids: &[Uuid]) -> ServiceResult<Vec<Uuid>> {
        let mut ids = Vec::with_capacity(role_ids.len());
        for id in role_ids {
            if !self.role_exists(*id) {
                return Err(ServiceError::InvalidInput(
                    "존재하지 않는 역할이 포함되어 있습니다".to_string(),
                ));
            }
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        Ok(ids)
    }

    fn materialize(&self, row: &UserRow) -> User {
        let mut roles: Vec<Role> = self
            .roles
            .iter()
            .filter(|r| row.role_ids.contains(&r.id))
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));

        User {
            id: row.id,
            email: row.email.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            is_active: row.is_active,
            roles,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn is_active_admin(&self, row: &UserRow) -> bool {
        row.is_active
            && self
                .roles
                .iter()
                .any(|r| row.role_ids.contains(&r.id) && is_admin_class(&r.name))
    }

    fn other_active_admins(&self, exclude: Uuid) -> impl Iterator<Item = &UserRow> + '_ {
        self.users
            .iter()
            .filter(move |u| u.id != exclude && self.is_active_admin(u))
    }

    fn has_other_active_admin(&self, exclude: Uuid) -> bool {
        self.other_active_admins(exclude).next().is_some()
    }
}

/// `RwLock` 기반 저장소.
///
/// 세 저장소 trait을 모두 구현합니다.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 작업 전에 `latency`만큼 지연하는 저장소 (타임아웃 테스트용).
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            tables: RwLock::default(),
            latency: Some(latency),
        }
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

// ==================== 사용자 ====================

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|row| tables.materialize(row)))
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|row| tables.materialize(row)))
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> ServiceResult<Option<(User, String)>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|row| (tables.materialize(row), row.password_hash.clone())))
    }

    async fn password_hash(&self, id: Uuid) -> ServiceResult<Option<String>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|row| row.password_hash.clone()))
    }

    async fn list(&self) -> ServiceResult<Vec<User>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables.users.iter().map(|row| tables.materialize(row)).collect())
    }

    async fn list_by_role_name(
        &self,
        role_name: &str,
        active_only: bool,
    ) -> ServiceResult<Vec<User>> {
        self.delay().await;
        let tables = self.tables.read().await;
        let Some(role) = tables
            .roles
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(role_name))
        else {
            return Ok(Vec::new());
        };

        Ok(tables
            .users
            .iter()
            .filter(|u| u.role_ids.contains(&role.id) && (!active_only || u.is_active))
            .map(|row| tables.materialize(row))
            .collect())
    }

    async fn list_by_role_id(&self, role_id: Uuid) -> ServiceResult<Vec<User>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| u.role_ids.contains(&role_id))
            .map(|row| tables.materialize(row))
            .collect())
    }

    async fn insert(&self, user: NewUser) -> ServiceResult<User> {
        self.delay().await;
        let mut tables = self.tables.write().await;

        if tables.email_taken(&user.email, None) {
            return Err(ServiceError::AlreadyExists(format!("이메일 '{}'", user.email)));
        }
        let role_ids = tables.check_role_ids(&user.role_ids)?;

        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: user.is_active,
            role_ids,
            created_at: now,
            updated_at: now,
        };
        let created = tables.materialize(&row);
        tables.users.push(row);
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> ServiceResult<Option<User>> {
        self.delay().await;
        let mut tables = self.tables.write().await;

        let Some(index) = tables.users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = &changes.email {
            if tables.email_taken(email, Some(id)) {
                return Err(ServiceError::AlreadyExists(format!("이메일 '{}'", email)));
            }
        }

        let mut row = tables.users[index].clone();
        if let Some(ids) = &changes.role_ids {
            row.role_ids = tables.check_role_ids(ids)?;
        }
        if let Some(email) = changes.email {
            row.email = email;
        }
        if let Some(hash) = changes.password_hash {
            row.password_hash = hash;
        }
        if let Some(first_name) = changes.first_name {
            row.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            row.last_name = last_name;
        }
        if let Some(is_active) = changes.is_active {
            row.is_active = is_active;
        }
        row.updated_at = Utc::now();

        if tables.is_active_admin(&tables.users[index])
            && !tables.is_active_admin(&row)
            && !tables.has_other_active_admin(id)
        {
            return Err(ServiceError::Conflict(LAST_ADMIN_MESSAGE.to_string()));
        }

        let updated = tables.materialize(&row);
        tables.users[index] = row;
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<bool> {
        self.delay().await;
        let mut tables = self.tables.write().await;

        let Some(index) = tables.users.iter().position(|u| u.id == id) else {
            return Ok(false);
        };
        if tables.is_active_admin(&tables.users[index]) && !tables.has_other_active_admin(id) {
            return Err(ServiceError::Conflict(LAST_ADMIN_MESSAGE.to_string()));
        }
        tables.users.remove(index);
        Ok(true)
    }

    async fn count_other_active_admins(&self, exclude: Uuid) -> ServiceResult<i64> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables.other_active_admins(exclude).count() as i64)
    }

    async fn any_active_admin(&self) -> ServiceResult<bool> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables.users.iter().any(|u| tables.is_active_admin(u)))
    }
}

// ==================== 역할 ====================

#[async_trait]
impl RoleStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Role>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> ServiceResult<Option<Role>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> ServiceResult<Vec<Role>> {
        self.delay().await;
        let tables = self.tables.read().await;
        let mut roles: Vec<Role> = tables
            .roles
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn list(&self) -> ServiceResult<Vec<Role>> {
        self.delay().await;
        let mut roles = self.tables.read().await.roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn list_by_permission(&self, permission: &str) -> ServiceResult<Vec<Role>> {
        self.delay().await;
        let tables = self.tables.read().await;
        let mut roles: Vec<Role> = tables
            .roles
            .iter()
            .filter(|r| r.has_permission(permission))
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn insert(&self, role: NewRole) -> ServiceResult<Role> {
        self.delay().await;
        let mut tables = self.tables.write().await;

        if tables.role_name_taken(&role.name, None) {
            return Err(ServiceError::AlreadyExists(format!("역할 '{}'", role.name)));
        }

        let now = Utc::now();
        let created = Role {
            id: Uuid::new_v4(),
            name: role.name,
            description: role.description,
            permissions: role.permissions,
            created_at: now,
            updated_at: now,
        };
        tables.roles.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: RoleChanges) -> ServiceResult<Option<Role>> {
        self.delay().await;
        let mut tables = self.tables.write().await;

        if let Some(name) = &changes.name {
            if tables.role_name_taken(name, Some(id)) {
                return Err(ServiceError::AlreadyExists(format!("역할 '{}'", name)));
            }
        }

        let Some(role) = tables.roles.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            role.name = name;
        }
        if let Some(description) = changes.description {
            role.description = Some(description);
        }
        if let Some(permissions) = changes.permissions {
            role.permissions = permissions;
        }
        role.updated_at = Utc::now();
        Ok(Some(role.clone()))
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<bool> {
        self.delay().await;
        let mut tables = self.tables.write().await;

        if tables.users.iter().any(|u| u.role_ids.contains(&id)) {
            return Err(ServiceError::Conflict(
                "역할을 보유한 사용자가 있어 삭제할 수 없습니다".to_string(),
            ));
        }
        let before = tables.roles.len();
        tables.roles.retain(|r| r.id != id);
        Ok(tables.roles.len() < before)
    }

    async fn member_count(&self, id: Uuid) -> ServiceResult<i64> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables.users.iter().filter(|u| u.role_ids.contains(&id)).count() as i64)
    }
}

// ==================== 주문 ====================

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Order>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list(&self) -> ServiceResult<Vec<Order>> {
        self.delay().await;
        // 최신 주문 먼저
        Ok(self.tables.read().await.orders.iter().rev().cloned().collect())
    }

    async fn insert(&self, order: NewOrder) -> ServiceResult<Order> {
        self.delay().await;
        let now = Utc::now();
        let created = Order {
            id: Uuid::new_v4(),
            customer_id: order.customer_id,
            driver_id: order.driver_id,
            vehicle_id: order.vehicle_id,
            pickup_address: order.pickup_address,
            delivery_address: order.delivery_address,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_amount: order
                .total_amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.orders.push(created.clone());
        Ok(created)
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> ServiceResult<Option<Order>> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        Ok(tables.orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> ServiceResult<Option<Order>> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        Ok(tables.orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.payment_status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<bool> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let before = tables.orders.len();
        tables.orders.retain(|o| o.id != id);
        Ok(tables.orders.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::Address;

    fn new_role(name: &str) -> NewRole {
        NewRole {
            name: name.to_string(),
            description: None,
            permissions: vec!["order:read".to_string()],
        }
    }

    fn new_user(email: &str, role_ids: Vec<Uuid>) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "Jisoo".to_string(),
            last_name: "Park".to_string(),
            is_active: true,
            role_ids,
        }
    }

    fn address() -> Address {
        Address {
            street: "1 Sejong-daero".to_string(),
            city: "Seoul".to_string(),
            state: "Seoul".to_string(),
            zip_code: "04524".to_string(),
            country: "KR".to_string(),
            latitude: None,
            longitude: None,
        }
    }

    #[tokio::test]
    async fn test_email_uniqueness_ignores_case() {
        let store = MemoryStore::new();
        UserStore::insert(&store, new_user("park@example.com", vec![]))
            .await
            .unwrap();

        let err = UserStore::insert(&store, new_user("PARK@example.com", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_unknown_role_is_rejected() {
        let store = MemoryStore::new();
        let err = UserStore::insert(&store, new_user("park@example.com", vec![Uuid::new_v4()]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_role_with_members_cannot_be_deleted() {
        let store = MemoryStore::new();
        let role = RoleStore::insert(&store, new_role("driver")).await.unwrap();
        let user = UserStore::insert(&store, new_user("park@example.com", vec![role.id]))
            .await
            .unwrap();
        assert_eq!(user.roles.len(), 1);

        let err = RoleStore::delete(&store, role.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        assert!(UserStore::delete(&store, user.id).await.unwrap());
        assert!(RoleStore::delete(&store, role.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_update_replaces_roles() {
        let store = MemoryStore::new();
        let driver = RoleStore::insert(&store, new_role("driver")).await.unwrap();
        let manager = RoleStore::insert(&store, new_role("manager")).await.unwrap();
        let user = UserStore::insert(&store, new_user("park@example.com", vec![driver.id]))
            .await
            .unwrap();

        let updated = UserStore::update(
            &store,
            user.id,
            UserChanges {
                role_ids: Some(vec![manager.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.role_names(), vec!["manager"]);
        assert_eq!(updated.email, "park@example.com");
    }

    #[tokio::test]
    async fn test_admin_counting() {
        let store = MemoryStore::new();
        let admin = RoleStore::insert(&store, new_role("admin")).await.unwrap();
        let first = UserStore::insert(&store, new_user("a@example.com", vec![admin.id]))
            .await
            .unwrap();

        assert!(store.any_active_admin().await.unwrap());
        assert_eq!(store.count_other_active_admins(first.id).await.unwrap(), 0);

        UserStore::insert(&store, new_user("b@example.com", vec![admin.id]))
            .await
            .unwrap();
        assert_eq!(store.count_other_active_admins(first.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_active_admin_is_kept() {
        let store = MemoryStore::new();
        let admin = RoleStore::insert(&store, new_role("admin")).await.unwrap();
        let driver = RoleStore::insert(&store, new_role("driver")).await.unwrap();
        let first = UserStore::insert(&store, new_user("a@example.com", vec![admin.id]))
            .await
            .unwrap();

        let err = UserStore::delete(&store, first.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let demote = UserChanges {
            role_ids: Some(vec![driver.id]),
            ..Default::default()
        };
        let err = UserStore::update(&store, first.id, demote.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(store.any_active_admin().await.unwrap());

        // 다른 관리자가 있으면 허용
        UserStore::insert(&store, new_user("b@example.com", vec![admin.id]))
            .await
            .unwrap();
        let demoted = UserStore::update(&store, first.id, demote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(demoted.role_names(), vec!["driver"]);
        assert!(UserStore::delete(&store, first.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_inactive_admin_can_be_deleted() {
        let store = MemoryStore::new();
        let admin = RoleStore::insert(&store, new_role("admin")).await.unwrap();
        let mut dormant = new_user("dormant@example.com", vec![admin.id]);
        dormant.is_active = false;
        let dormant = UserStore::insert(&store, dormant).await.unwrap();

        assert!(UserStore::delete(&store, dormant.id).await.unwrap());
        assert!(!UserStore::delete(&store, dormant.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_order_defaults_and_updates() {
        let store = MemoryStore::new();
        let order = OrderStore::insert(
            &store,
            NewOrder {
                customer_id: Uuid::new_v4(),
                driver_id: None,
                vehicle_id: None,
                pickup_address: address(),
                delivery_address: address(),
                total_amount: rust_decimal::Decimal::new(12345, 3),
            },
        )
        .await
        .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total_amount.to_string(), "12.35");

        let paid = store
            .update_payment_status(order.id, PaymentStatus::Paid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(store
            .update_status(Uuid::new_v4(), OrderStatus::Assigned)
            .await
            .unwrap()
            .is_none());
    }
}
