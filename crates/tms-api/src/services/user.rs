//! 사용자 서비스.

use serde::Deserialize;
use std::sync::Arc;
use tms_cache::{keys, Cache};
use tms_core::{normalize_email, ServiceError, ServiceResult, User};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::validate;
use crate::auth::{hash_password_blocking, verify_password_blocking};
use crate::repository::{NewUser, RoleStore, UserChanges, UserStore, LAST_ADMIN_MESSAGE};

// ==================== DTO ====================

/// 사용자 생성 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserDto {
    #[validate(email(message = "이메일 형식이 올바르지 않습니다"))]
    pub email: String,
    #[validate(length(min = 6, message = "비밀번호는 최소 6자 이상이어야 합니다"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "이름은 1-100자여야 합니다"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "성은 1-100자여야 합니다"))]
    pub last_name: String,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub role_ids: Option<Vec<Uuid>>,
}

/// 사용자 부분 수정 요청.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserDto {
    #[validate(email(message = "이메일 형식이 올바르지 않습니다"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "비밀번호는 최소 6자 이상이어야 합니다"))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 100, message = "이름은 1-100자여야 합니다"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "성은 1-100자여야 합니다"))]
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    /// 지정 시 역할 집합 전체를 교체
    pub role_ids: Option<Vec<Uuid>>,
}

/// 비밀번호 변경 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordDto {
    #[validate(length(min = 1, message = "현재 비밀번호가 필요합니다"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "비밀번호는 최소 6자 이상이어야 합니다"))]
    pub new_password: String,
}

/// 활성 상태 변경 요청.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusDto {
    pub is_active: bool,
}

// ==================== 서비스 ====================

/// 사용자 CRUD 및 권한 집계.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    cache: Cache,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, roles: Arc<dyn RoleStore>, cache: Cache) -> Self {
        Self {
            users,
            roles,
            cache,
        }
    }

    pub async fn create(&self, dto: CreateUserDto) -> ServiceResult<User> {
        validate(&dto)?;
        let email = normalize_email(&dto.email);

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::AlreadyExists(format!("이메일 '{}'", email)));
        }

        let role_ids = dto.role_ids.unwrap_or_default();
        self.ensure_roles_exist(&role_ids).await?;

        let password_hash = hash_password_blocking(dto.password).await?;
        let user = self
            .users
            .insert(NewUser {
                email,
                password_hash,
                first_name: dto.first_name.trim().to_string(),
                last_name: dto.last_name.trim().to_string(),
                is_active: dto.is_active.unwrap_or(true),
                role_ids,
            })
            .await?;

        self.invalidate(&[&user]).await;
        info!(user_id = %user.id, roles = ?user.role_names(), "User created");
        Ok(user)
    }

    pub async fn find_all(&self) -> ServiceResult<Vec<User>> {
        self.cache
            .get_or_load(&keys::users_all(), Some(keys::ENTITY_TTL), || self.users.list())
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> ServiceResult<User> {
        self.cache
            .get_or_load(&keys::user(id), Some(keys::ENTITY_TTL), || async {
                self.users
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("사용자", id))
            })
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<User> {
        let email = normalize_email(email);
        self.cache
            .get_or_load(&keys::user_by_email(&email), Some(keys::ENTITY_TTL), || async {
                self.users
                    .find_by_email(&email)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("사용자", &email))
            })
            .await
    }

    /// 부분 수정.
    ///
    /// 마지막 활성 관리자를 비활성화하거나 관리자 역할을 빼는 변경은 `Conflict`입니다.
    /// 저장소가 같은 조건을 변경과 함께 다시 확인합니다.
    pub async fn update(&self, id: Uuid, dto: UpdateUserDto) -> ServiceResult<User> {
        validate(&dto)?;
        let current = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("사용자", id))?;

        let email = dto.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            if *email != current.email {
                if let Some(other) = self.users.find_by_email(email).await? {
                    if other.id != id {
                        return Err(ServiceError::AlreadyExists(format!("이메일 '{}'", email)));
                    }
                }
            }
        }

        if let Some(role_ids) = &dto.role_ids {
            self.ensure_roles_exist(role_ids).await?;
        }

        let loses_admin = match (&dto.role_ids, dto.is_active) {
            (_, Some(false)) => true,
            (Some(role_ids), _) => {
                let roles = self.roles.find_many(role_ids).await?;
                !roles.iter().any(|r| r.is_admin_class())
            }
            _ => false,
        };
        if loses_admin {
            self.guard_last_admin(&current).await?;
        }

        let password_hash = match dto.password {
            Some(password) => Some(hash_password_blocking(password).await?),
            None => None,
        };

        let updated = self
            .users
            .update(
                id,
                UserChanges {
                    email,
                    password_hash,
                    first_name: dto.first_name.map(|s| s.trim().to_string()),
                    last_name: dto.last_name.map(|s| s.trim().to_string()),
                    is_active: dto.is_active,
                    role_ids: dto.role_ids,
                },
            )
            .await?
            .ok_or_else(|| ServiceError::not_found("사용자", id))?;

        self.invalidate(&[&current, &updated]).await;
        info!(user_id = %id, "User updated");
        Ok(updated)
    }

    /// 삭제. 마지막 활성 관리자는 삭제할 수 없습니다.
    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("사용자", id))?;

        self.guard_last_admin(&user).await?;

        if !self.users.delete(id).await? {
            return Err(ServiceError::not_found("사용자", id));
        }

        self.invalidate(&[&user]).await;
        info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// 사용자의 유효 권한 (보유 역할 권한의 합집합).
    pub async fn permissions(&self, id: Uuid) -> ServiceResult<Vec<String>> {
        self.cache
            .get_or_load(&keys::user_permissions(id), Some(keys::ENTITY_TTL), || async {
                let user = self
                    .users
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("사용자", id))?;
                Ok(user.permissions())
            })
            .await
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> ServiceResult<User> {
        self.update(
            id,
            UpdateUserDto {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
        .await
    }

    /// 역할 이름으로 활성 사용자 조회.
    pub async fn users_by_role(&self, role_name: &str) -> ServiceResult<Vec<User>> {
        self.cache
            .get_or_load(&keys::users_by_role(role_name), Some(keys::ENTITY_TTL), || {
                self.users.list_by_role_name(role_name, true)
            })
            .await
    }

    /// 비밀번호 변경. 현재 비밀번호가 다르면 `InvalidCredentials`.
    pub async fn change_password(&self, id: Uuid, dto: ChangePasswordDto) -> ServiceResult<()> {
        validate(&dto)?;
        let current_hash = self
            .users
            .password_hash(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("사용자", id))?;

        if !verify_password_blocking(dto.current_password, current_hash).await? {
            warn!(user_id = %id, "Password change rejected: current password mismatch");
            return Err(ServiceError::InvalidCredentials);
        }

        let password_hash = hash_password_blocking(dto.new_password).await?;
        let updated = self
            .users
            .update(
                id,
                UserChanges {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| ServiceError::not_found("사용자", id))?;

        self.invalidate(&[&updated]).await;
        info!(user_id = %id, "Password changed");
        Ok(())
    }

    // =========================================================================
    // 내부 헬퍼
    // =========================================================================

    /// 모든 역할 ID가 존재하는지 확인합니다. 없는 ID는 에러 메시지에 나열됩니다.
    async fn ensure_roles_exist(&self, role_ids: &[Uuid]) -> ServiceResult<()> {
        if role_ids.is_empty() {
            return Ok(());
        }

        let found = self.roles.find_many(role_ids).await?;
        let missing: Vec<String> = role_ids
            .iter()
            .filter(|id| !found.iter().any(|r| r.id == **id))
            .map(Uuid::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::InvalidInput(format!(
                "존재하지 않는 역할: {}",
                missing.join(", ")
            )))
        }
    }

    /// `user`가 유일한 활성 관리자이면 `Conflict`.
    async fn guard_last_admin(&self, user: &User) -> ServiceResult<()> {
        if !(user.is_active && user.is_admin()) {
            return Ok(());
        }
        if self.users.count_other_active_admins(user.id).await? == 0 {
            warn!(user_id = %user.id, "Refusing to remove the last active administrator");
            return Err(ServiceError::Conflict(LAST_ADMIN_MESSAGE.to_string()));
        }
        Ok(())
    }

    /// `users:` 전체와 `affected`가 변경 전후로 속한 역할의 보유자 목록을 비웁니다.
    async fn invalidate(&self, affected: &[&User]) {
        self.cache.invalidate_prefix(keys::USERS_PREFIX).await;

        let mut role_ids: Vec<Uuid> = affected
            .iter()
            .flat_map(|user| user.roles.iter().map(|role| role.id))
            .collect();
        role_ids.sort_unstable();
        role_ids.dedup();
        for role_id in role_ids {
            self.cache.delete(&keys::role_users(role_id)).await;
        }
    }
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
