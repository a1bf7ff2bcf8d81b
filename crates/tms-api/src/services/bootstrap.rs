//! 초기 데이터 생성.
//!
//! 표준 역할(admin, manager, dispatcher, driver, customer)이 없으면 만들고,
//! 활성 관리자가 한 명도 없을 때만 설정된 관리자 계정을 생성합니다.
//! 이미 존재하는 역할의 권한은 덮어쓰지 않습니다.

use tms_core::domain::role::names;
use tms_core::{BootstrapConfig, Role, ServiceError, ServiceResult, User};
use tracing::info;

use super::role::{CreateRoleDto, RoleService};
use super::user::{CreateUserDto, UserService};
use crate::repository::UserStore;

/// 관리자 역할의 와일드카드 권한.
pub const WILDCARD_PERMISSION: &str = "*";

const STANDARD_ROLES: &[(&str, &str, &[&str])] = &[
    (
        names::ADMIN,
        "System Administrator with full access",
        &[WILDCARD_PERMISSION],
    ),
    (
        names::MANAGER,
        "Manager with access to most features except system configuration",
        &[
            "order:create",
            "order:list",
            "order:read",
            "order:update",
            "role:list",
            "role:read",
            "system:access",
            "user:list",
            "user:read",
        ],
    ),
    (
        names::DISPATCHER,
        "Dispatcher responsible for order management",
        &["order:create", "order:list", "order:read", "order:update"],
    ),
    (
        names::DRIVER,
        "Driver with access to assigned orders",
        &["order:read", "order:update"],
    ),
    (
        names::CUSTOMER,
        "Customer with access to their own orders",
        &["order:create", "order:read"],
    ),
];

/// 표준 역할과 초기 관리자를 준비합니다.
///
/// 관리자 계정을 새로 만들었으면 `Some(user)`를 반환합니다.
pub async fn ensure_admin(
    config: &BootstrapConfig,
    store: &dyn UserStore,
    users: &UserService,
    roles: &RoleService,
) -> ServiceResult<Option<User>> {
    let mut admin_role = None;
    for (name, description, permissions) in STANDARD_ROLES {
        let role = ensure_role(roles, name, description, permissions).await?;
        if *name == names::ADMIN {
            admin_role = Some(role);
        }
    }
    let admin_role = admin_role
        .ok_or_else(|| ServiceError::Internal("admin 역할을 준비하지 못했습니다".to_string()))?;

    if store.any_active_admin().await? {
        info!("Active administrator present, skipping admin bootstrap");
        return Ok(None);
    }

    let admin = users
        .create(CreateUserDto {
            email: config.email.clone(),
            password: config.password.clone(),
            first_name: config.first_name.clone(),
            last_name: config.last_name.clone(),
            is_active: Some(true),
            role_ids: Some(vec![admin_role.id]),
        })
        .await?;

    info!(user_id = %admin.id, email = %admin.email, "Bootstrap administrator created");
    Ok(Some(admin))
}

async fn ensure_role(
    roles: &RoleService,
    name: &str,
    description: &str,
    permissions: &[&str],
) -> ServiceResult<Role> {
    match roles.find_by_name(name).await {
        Ok(role) => Ok(role),
        Err(ServiceError::NotFound(_)) => {
            info!(role = name, "Creating standard role");
            roles
                .create(CreateRoleDto {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    permissions: Some(permissions.iter().map(|p| p.to_string()).collect()),
                })
                .await
        }
        Err(e) => Err(e),
    }
}
