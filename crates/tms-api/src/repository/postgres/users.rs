//! 사용자 저장소 (PostgreSQL).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::collections::HashMap;
use tms_core::{Role, ServiceError, ServiceResult, User, ADMIN_CLASS_ROLES};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{db_err, is_foreign_key_violation, is_unique_violation, PgStore};
use crate::repository::{NewUser, UserChanges, UserStore, LAST_ADMIN_MESSAGE};

type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// 관리자 보유 변경을 직렬화하는 트랜잭션 advisory lock 키.
const ADMIN_GUARD_LOCK: i64 = 0x746d_735f_6164_6d6e;

// ==================== DB 레코드 ====================

#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct CredentialRecord {
    #[sqlx(flatten)]
    user: UserRecord,
    password_hash: String,
}

#[derive(Debug, Clone, FromRow)]
struct UserRoleRecord {
    user_id: Uuid,
    #[sqlx(flatten)]
    role: Role,
}

impl UserRecord {
    fn into_user(self, roles: Vec<Role>) -> User {
        User {
            id: self.id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            is_active: self.is_active,
            roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "u.id, u.email, u.first_name, u.last_name, u.is_active, u.created_at, u.updated_at";

fn admin_role_names() -> Vec<String> {
    ADMIN_CLASS_ROLES.iter().map(|r| r.to_string()).collect()
}

impl PgStore {
    /// 사용자 레코드에 역할을 붙입니다 (조인 쿼리 1회).
    async fn attach_roles(&self, records: Vec<UserRecord>) -> ServiceResult<Vec<User>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let rows = sqlx::query_as::<_, UserRoleRecord>(
            r#"
            SELECT ur.user_id, r.id, r.name, r.description, r.permissions,
                   r.created_at, r.updated_at
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ANY($1)
            ORDER BY r.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("사용자 역할 조회", e))?;

        let mut by_user: HashMap<Uuid, Vec<Role>> = HashMap::new();
        for row in rows {
            by_user.entry(row.user_id).or_default().push(row.role);
        }

        Ok(records
            .into_iter()
            .map(|record| {
                let roles = by_user.remove(&record.id).unwrap_or_default();
                record.into_user(roles)
            })
            .collect())
    }

    async fn attach_roles_one(&self, record: Option<UserRecord>) -> ServiceResult<Option<User>> {
        match record {
            Some(record) => Ok(self.attach_roles(vec![record]).await?.pop()),
            None => Ok(None),
        }
    }

    /// 관리자 보유 변경을 트랜잭션 끝까지 직렬화합니다.
    ///
    /// 잠금을 얻은 뒤의 조회는 앞서 끝난 트랜잭션의 결과를 봅니다.
    async fn lock_admin_guard(tx: &mut PgTransaction<'_>) -> ServiceResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ADMIN_GUARD_LOCK)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_err("관리자 잠금", e))?;
        Ok(())
    }

    /// 활성 관리자 존재 여부. `only`가 있으면 그 사용자만 봅니다.
    async fn active_admin_exists(
        tx: &mut PgTransaction<'_>,
        only: Option<Uuid>,
    ) -> ServiceResult<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM users u
                JOIN user_roles ur ON ur.user_id = u.id
                JOIN roles r ON r.id = ur.role_id
                WHERE LOWER(r.name) = ANY($1)
                  AND u.is_active
                  AND ($2::uuid IS NULL OR u.id = $2)
            )
            "#,
        )
        .bind(admin_role_names())
        .bind(only)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| db_err("관리자 존재 확인", e))?;

        Ok(row.0)
    }

    /// 변경 전에 관리자였던 사용자가 마지막 관리자였다면 롤백 대상입니다.
    async fn ensure_admin_remains(
        tx: &mut PgTransaction<'_>,
        user_id: Uuid,
        was_admin: bool,
    ) -> ServiceResult<()> {
        if was_admin && !Self::active_admin_exists(tx, None).await? {
            warn!(user_id = %user_id, "Refusing to remove the last active administrator");
            return Err(ServiceError::Conflict(LAST_ADMIN_MESSAGE.to_string()));
        }
        Ok(())
    }

    async fn replace_roles(
        tx: &mut PgTransaction<'_>,
        user_id: Uuid,
        role_ids: &[Uuid],
    ) -> ServiceResult<()> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_err("사용자 역할 삭제", e))?;

        if role_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, role_id FROM UNNEST($2::uuid[]) AS t(role_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_ids)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ServiceError::InvalidInput("존재하지 않는 역할이 포함되어 있습니다".to_string())
            } else {
                db_err("사용자 역할 할당", e)
            }
        })?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("사용자 조회", e))?;

        self.attach_roles_one(record).await
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE LOWER(u.email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("이메일로 사용자 조회", e))?;

        self.attach_roles_one(record).await
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> ServiceResult<Option<(User, String)>> {
        let record = sqlx::query_as::<_, CredentialRecord>(&format!(
            "SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE LOWER(u.email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("자격 증명 조회", e))?;

        let Some(CredentialRecord {
            user,
            password_hash,
        }) = record
        else {
            return Ok(None);
        };

        Ok(self
            .attach_roles_one(Some(user))
            .await?
            .map(|user| (user, password_hash)))
    }

    async fn password_hash(&self, id: Uuid) -> ServiceResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT password_hash FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_err("비밀번호 해시 조회", e))?;

        Ok(row.map(|r| r.0))
    }

    async fn list(&self) -> ServiceResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users u ORDER BY u.created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("사용자 목록 조회", e))?;

        self.attach_roles(records).await
    }

    async fn list_by_role_name(
        &self,
        role_name: &str,
        active_only: bool,
    ) -> ServiceResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            JOIN roles r ON r.id = ur.role_id
            WHERE LOWER(r.name) = LOWER($1)
              AND ($2 = FALSE OR u.is_active)
            ORDER BY u.created_at
            "#
        ))
        .bind(role_name)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("역할별 사용자 조회", e))?;

        self.attach_roles(records).await
    }

    async fn list_by_role_id(&self, role_id: Uuid) -> ServiceResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            WHERE ur.role_id = $1
            ORDER BY u.created_at
            "#
        ))
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("역할 보유자 조회", e))?;

        self.attach_roles(records).await
    }

    async fn insert(&self, user: NewUser) -> ServiceResult<User> {
        debug!("사용자 생성: email={}", user.email);

        let id = Uuid::new_v4();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("트랜잭션 시작", e))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::AlreadyExists(format!("이메일 '{}'", user.email))
            } else {
                db_err("사용자 생성", e)
            }
        })?;

        Self::replace_roles(&mut tx, id, &user.role_ids).await?;
        tx.commit().await.map_err(|e| db_err("트랜잭션 커밋", e))?;

        info!("사용자 생성 완료: id={}", id);
        UserStore::find_by_id(self, id)
            .await?
            .ok_or_else(|| ServiceError::Internal("생성된 사용자를 찾을 수 없습니다".to_string()))
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> ServiceResult<Option<User>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("트랜잭션 시작", e))?;

        let touches_admin = changes.is_active == Some(false) || changes.role_ids.is_some();
        let was_admin = if touches_admin {
            Self::lock_admin_guard(&mut tx).await?;
            Self::active_admin_exists(&mut tx, Some(id)).await?
        } else {
            false
        };

        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(changes.is_active)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::AlreadyExists(format!(
                    "이메일 '{}'",
                    changes.email.as_deref().unwrap_or_default()
                ))
            } else {
                db_err("사용자 수정", e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(role_ids) = &changes.role_ids {
            Self::replace_roles(&mut tx, id, role_ids).await?;
        }
        Self::ensure_admin_remains(&mut tx, id, was_admin).await?;
        tx.commit().await.map_err(|e| db_err("트랜잭션 커밋", e))?;

        UserStore::find_by_id(self, id).await
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("트랜잭션 시작", e))?;

        Self::lock_admin_guard(&mut tx).await?;
        let was_admin = Self::active_admin_exists(&mut tx, Some(id)).await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("사용자 삭제", e))?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        Self::ensure_admin_remains(&mut tx, id, was_admin).await?;
        tx.commit().await.map_err(|e| db_err("트랜잭션 커밋", e))?;
        Ok(true)
    }

    async fn count_other_active_admins(&self, exclude: Uuid) -> ServiceResult<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT u.id)
            FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            JOIN roles r ON r.id = ur.role_id
            WHERE LOWER(r.name) = ANY($1)
              AND u.is_active
              AND u.id <> $2
            "#,
        )
        .bind(admin_role_names())
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("관리자 수 조회", e))?;

        Ok(row.0)
    }

    async fn any_active_admin(&self) -> ServiceResult<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM users u
                JOIN user_roles ur ON ur.user_id = u.id
                JOIN roles r ON r.id = ur.role_id
                WHERE LOWER(r.name) = ANY($1) AND u.is_active
            )
            "#,
        )
        .bind(admin_role_names())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("관리자 존재 확인", e))?;

        Ok(row.0)
    }
}
