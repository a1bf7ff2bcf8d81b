//! 역할 서비스.
//!
//! 역할 변경은 `roles:` 와 `users:` 접두사를 모두 무효화합니다.
//! 사용자 조회 결과와 권한 집합이 역할 데이터를 포함하기 때문입니다.

use serde::Deserialize;
use std::sync::Arc;
use tms_cache::{keys, Cache};
use tms_core::{aggregate_permissions, normalize_permissions, Role, ServiceError, ServiceResult, User};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::validate;
use crate::repository::{NewRole, RoleChanges, RoleStore, UserStore};

/// 역할 생성 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleDto {
    #[validate(length(min = 1, max = 50, message = "역할 이름은 1-50자여야 합니다"))]
    pub name: String,
    #[validate(length(max = 255, message = "설명은 255자 이하여야 합니다"))]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// 역할 부분 수정 요청.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleDto {
    #[validate(length(min = 1, max = 50, message = "역할 이름은 1-50자여야 합니다"))]
    pub name: Option<String>,
    #[validate(length(max = 255, message = "설명은 255자 이하여야 합니다"))]
    pub description: Option<String>,
    /// 지정 시 권한 목록 전체를 교체
    pub permissions: Option<Vec<String>>,
}

/// 권한 추가/제거/교체 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsDto {
    #[validate(length(min = 1, message = "권한 목록이 비어 있습니다"))]
    pub permissions: Vec<String>,
}

/// 역할 CRUD 및 권한 관리.
#[derive(Clone)]
pub struct RoleService {
    roles: Arc<dyn RoleStore>,
    users: Arc<dyn UserStore>,
    cache: Cache,
}

impl RoleService {
    pub fn new(roles: Arc<dyn RoleStore>, users: Arc<dyn UserStore>, cache: Cache) -> Self {
        Self { roles, users, cache }
    }

    pub async fn create(&self, dto: CreateRoleDto) -> ServiceResult<Role> {
        validate(&dto)?;
        let name = dto.name.trim().to_string();

        if self.roles.find_by_name(&name).await?.is_some() {
            return Err(ServiceError::AlreadyExists(format!("역할 '{}'", name)));
        }

        let role = self
            .roles
            .insert(NewRole {
                name,
                description: dto.description,
                permissions: normalize_permissions(dto.permissions.unwrap_or_default()),
            })
            .await?;

        self.invalidate().await;
        info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }

    pub async fn find_all(&self) -> ServiceResult<Vec<Role>> {
        self.cache
            .get_or_load(&keys::roles_all(), Some(keys::ENTITY_TTL), || self.roles.list())
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> ServiceResult<Role> {
        self.cache
            .get_or_load(&keys::role(id), Some(keys::ENTITY_TTL), || self.load(id))
            .await
    }

    pub async fn find_by_name(&self, name: &str) -> ServiceResult<Role> {
        let name = name.trim();
        self.cache
            .get_or_load(&keys::role_by_name(name), Some(keys::ENTITY_TTL), || async {
                self.roles
                    .find_by_name(name)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("역할", name))
            })
            .await
    }

    /// 부분 수정. 보호된 역할의 이름은 바꿀 수 없습니다.
    pub async fn update(&self, id: Uuid, dto: UpdateRoleDto) -> ServiceResult<Role> {
        validate(&dto)?;
        let current = self.load(id).await?;

        let name = dto.name.map(|n| n.trim().to_string());
        if let Some(name) = &name {
            if !name.eq_ignore_ascii_case(&current.name) {
                if current.is_protected() {
                    return Err(ServiceError::Conflict(format!(
                        "시스템 역할 '{}'의 이름은 변경할 수 없습니다",
                        current.name
                    )));
                }
                if let Some(other) = self.roles.find_by_name(name).await? {
                    if other.id != id {
                        return Err(ServiceError::AlreadyExists(format!("역할 '{}'", name)));
                    }
                }
            }
        }

        let updated = self
            .apply(
                id,
                RoleChanges {
                    name,
                    description: dto.description,
                    permissions: dto.permissions.map(normalize_permissions),
                },
            )
            .await?;

        info!(role_id = %id, "Role updated");
        Ok(updated)
    }

    /// 삭제. 보호된 역할이거나 보유자가 남아 있으면 `Conflict`.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        let role = self.load(id).await?;

        if role.is_protected() {
            warn!(role_id = %id, name = %role.name, "Refusing to delete protected role");
            return Err(ServiceError::Conflict(format!(
                "시스템 역할 '{}'은(는) 삭제할 수 없습니다",
                role.name
            )));
        }

        let members = self.roles.member_count(id).await?;
        if members > 0 {
            return Err(ServiceError::Conflict(format!(
                "역할 '{}'을(를) 보유한 사용자가 {}명 있습니다",
                role.name, members
            )));
        }

        if !self.roles.delete(id).await? {
            return Err(ServiceError::not_found("역할", id));
        }

        self.invalidate().await;
        info!(role_id = %id, name = %role.name, "Role deleted");
        Ok(())
    }

    /// 권한 추가 (중복 제거 후 병합).
    pub async fn add_permissions(&self, id: Uuid, dto: PermissionsDto) -> ServiceResult<Role> {
        let requested = Self::requested_permissions(dto)?;
        let role = self.load(id).await?;

        let merged = normalize_permissions(role.permissions.iter().chain(requested.iter()));
        self.apply_permissions(id, merged).await
    }

    /// 권한 제거. 없는 권한은 무시합니다.
    pub async fn remove_permissions(&self, id: Uuid, dto: PermissionsDto) -> ServiceResult<Role> {
        let requested = Self::requested_permissions(dto)?;
        let role = self.load(id).await?;

        let remaining: Vec<String> = role
            .permissions
            .into_iter()
            .filter(|p| !requested.contains(p))
            .collect();
        self.apply_permissions(id, remaining).await
    }

    /// 권한 목록 교체.
    pub async fn set_permissions(&self, id: Uuid, permissions: Vec<String>) -> ServiceResult<Role> {
        self.load(id).await?;
        self.apply_permissions(id, normalize_permissions(permissions))
            .await
    }

    /// 역할 보유 사용자.
    pub async fn users_with_role(&self, id: Uuid) -> ServiceResult<Vec<User>> {
        self.cache
            .get_or_load(&keys::role_users(id), Some(keys::ENTITY_TTL), || async {
                self.load(id).await?;
                self.users.list_by_role_id(id).await
            })
            .await
    }

    /// 모든 역할에 등록된 권한의 합집합.
    pub async fn all_permissions(&self) -> ServiceResult<Vec<String>> {
        self.cache
            .get_or_load(&keys::roles_permissions(), Some(keys::ENTITY_TTL), || async {
                let roles = self.roles.list().await?;
                Ok(aggregate_permissions(&roles))
            })
            .await
    }

    /// 특정 권한을 가진 역할.
    pub async fn roles_by_permission(&self, permission: &str) -> ServiceResult<Vec<Role>> {
        let permission = permission.trim();
        self.cache
            .get_or_load(
                &keys::roles_by_permission(permission),
                Some(keys::ENTITY_TTL),
                || self.roles.list_by_permission(permission),
            )
            .await
    }

    // =========================================================================
    // 내부 헬퍼
    // =========================================================================

    async fn load(&self, id: Uuid) -> ServiceResult<Role> {
        self.roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("역할", id))
    }

    fn requested_permissions(dto: PermissionsDto) -> ServiceResult<Vec<String>> {
        validate(&dto)?;
        let permissions = normalize_permissions(dto.permissions);
        if permissions.is_empty() {
            return Err(ServiceError::InvalidInput(
                "유효한 권한이 없습니다".to_string(),
            ));
        }
        Ok(permissions)
    }

    async fn apply_permissions(&self, id: Uuid, permissions: Vec<String>) -> ServiceResult<Role> {
        let count = permissions.len();
        let role = self
            .apply(
                id,
                RoleChanges {
                    permissions: Some(permissions),
                    ..Default::default()
                },
            )
            .await?;

        info!(role_id = %id, permissions = count, "Role permissions updated");
        Ok(role)
    }

    async fn apply(&self, id: Uuid, changes: RoleChanges) -> ServiceResult<Role> {
        let role = self
            .roles
            .update(id, changes)
            .await?
            .ok_or_else(|| ServiceError::not_found("역할", id))?;

        self.invalidate().await;
        Ok(role)
    }

    async fn invalidate(&self) {
        self.cache.invalidate_prefix(keys::ROLES_PREFIX).await;
        self.cache.invalidate_prefix(keys::USERS_PREFIX).await;
    }
}

impl std::fmt::Debug for RoleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
