//! 역할 저장소 (PostgreSQL).

use async_trait::async_trait;
use tms_core::{Role, ServiceError, ServiceResult};
use tracing::{debug, info};
use uuid::Uuid;

use super::{db_err, is_foreign_key_violation, is_unique_violation, PgStore};
use crate::repository::{NewRole, RoleChanges, RoleStore};

const ROLE_COLUMNS: &str = "id, name, description, permissions, created_at, updated_at";

#[async_trait]
impl RoleStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Role>> {
        sqlx::query_as::<_, Role>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("역할 조회", e))
    }

    async fn find_by_name(&self, name: &str) -> ServiceResult<Option<Role>> {
        sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE LOWER(name) = LOWER($1)"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("이름으로 역할 조회", e))
    }

    async fn find_many(&self, ids: &[Uuid]) -> ServiceResult<Vec<Role>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = ANY($1) ORDER BY name"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("역할 일괄 조회", e))
    }

    async fn list(&self) -> ServiceResult<Vec<Role>> {
        sqlx::query_as::<_, Role>(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY name"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("역할 목록 조회", e))
    }

    async fn list_by_permission(&self, permission: &str) -> ServiceResult<Vec<Role>> {
        sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE $1 = ANY(permissions) ORDER BY name"
        ))
        .bind(permission)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("권한별 역할 조회", e))
    }

    async fn insert(&self, role: NewRole) -> ServiceResult<Role> {
        debug!("역할 생성: name={}", role.name);

        let created = sqlx::query_as::<_, Role>(&format!(
            r#"
            INSERT INTO roles (id, name, description, permissions)
            VALUES ($1, $2, $3, $4)
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&role.name)
        .bind(&role.description)
        .bind(&role.permissions)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::AlreadyExists(format!("역할 '{}'", role.name))
            } else {
                db_err("역할 생성", e)
            }
        })?;

        info!("역할 생성 완료: id={}, name={}", created.id, created.name);
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: RoleChanges) -> ServiceResult<Option<Role>> {
        sqlx::query_as::<_, Role>(&format!(
            r#"
            UPDATE roles SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                permissions = COALESCE($4, permissions),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(&changes.permissions)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::AlreadyExists(format!(
                    "역할 '{}'",
                    changes.name.as_deref().unwrap_or_default()
                ))
            } else {
                db_err("역할 수정", e)
            }
        })
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    ServiceError::Conflict("역할을 보유한 사용자가 있어 삭제할 수 없습니다".to_string())
                } else {
                    db_err("역할 삭제", e)
                }
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn member_count(&self, id: Uuid) -> ServiceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("역할 보유자 수 조회", e))?;

        Ok(row.0)
    }
}
