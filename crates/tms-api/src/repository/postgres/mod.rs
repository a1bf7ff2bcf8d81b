//! PostgreSQL 저장소 구현.
//!
//! 사용자와 역할은 `user_roles` 조인 테이블로 연결됩니다. 사용자 조회 시
//! 역할은 별도 조인 쿼리로 한 번에 읽어 붙입니다.

mod orders;
mod roles;
mod users;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use tms_core::{DatabaseConfig, ServiceError};
use tracing::{error, info};

/// `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";
/// `foreign_key_violation`
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// `query_canceled` (`statement_timeout` 초과 포함)
const QUERY_CANCELED: &str = "57014";

/// sqlx 기반 저장소.
///
/// [`UserStore`](super::UserStore), [`RoleStore`](super::RoleStore),
/// [`OrderStore`](super::OrderStore)를 모두 구현합니다.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 설정으로 연결 풀을 만듭니다.
    ///
    /// 모든 세션에 `statement_timeout`을 걸어 멈춘 쿼리가 `Unavailable`로 끝나게 합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let statement_timeout = config.statement_timeout_ms.to_string();
        let options = PgConnectOptions::from_str(&config.url)?
            .options([("statement_timeout", statement_timeout.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;

        info!(
            max_connections = config.max_connections,
            statement_timeout_ms = config.statement_timeout_ms,
            "Database pool ready"
        );
        Ok(Self::new(pool))
    }

    /// 연결 확인 (`SELECT 1`).
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully");
        Ok(())
    }
}

/// 드라이버 에러의 제약 조건 코드.
fn constraint_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    constraint_code(err).as_deref() == Some(UNIQUE_VIOLATION)
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    constraint_code(err).as_deref() == Some(FOREIGN_KEY_VIOLATION)
}

fn is_query_canceled(err: &sqlx::Error) -> bool {
    constraint_code(err).as_deref() == Some(QUERY_CANCELED)
}

/// sqlx 에러를 서비스 에러로 변환합니다.
///
/// 연결/풀 에러와 쿼리 타임아웃은 `Unavailable`, 나머지는 `Internal`이며
/// 원본은 로그에만 남깁니다.
fn db_err(context: &'static str, err: sqlx::Error) -> ServiceError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            error!(context, error = %err, "Database unavailable");
            ServiceError::Unavailable("데이터베이스 연결 실패".to_string())
        }
        ref timed_out if is_query_canceled(timed_out) => {
            error!(context, error = %err, "Database query timed out");
            ServiceError::Unavailable("데이터베이스 응답 시간 초과".to_string())
        }
        other => {
            error!(context, error = %other, "Database query failed");
            ServiceError::Internal(format!("{} 실패", context))
        }
    }
}
