//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 HTTP 핸들러와 RPC 디스패처가 함께 사용합니다.
//! `Arc`로 래핑되어 여러 요청 간에 안전하게 공유됩니다.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tms_cache::Cache;
use tms_core::{JwtConfig, TmsBackendConfig};

use crate::auth::{AccessPolicy, TokenService};
use crate::backend::TmsBackendClient;
use crate::repository::{MemoryStore, OrderStore, PgStore, RoleStore, UserStore};
use crate::services::{AuthService, OrderService, RoleService, UserService};

/// 서비스가 사용하는 저장소 묶음.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub roles: Arc<dyn RoleStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    /// PostgreSQL 저장소.
    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            users: store.clone(),
            roles: store.clone(),
            orders: store,
        }
    }

    /// 프로세스 내 저장소.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            roles: store.clone(),
            orders: store,
        }
    }
}

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 캐시 (Redis 또는 메모리)
    pub cache: Cache,

    /// 토큰 발급/검증
    pub tokens: Arc<TokenService>,

    /// 작업별 허용 역할
    pub policy: Arc<AccessPolicy>,

    pub auth: AuthService,
    pub users: UserService,
    pub roles: RoleService,
    pub orders: OrderService,

    /// 데이터베이스 (헬스 체크용, 메모리 저장소로 실행 중이면 None)
    pub db: Option<PgStore>,

    /// TMS 백엔드 (헬스 체크용, 설정이 없으면 None)
    pub tms_backend: Option<TmsBackendClient>,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 저장소와 캐시로부터 서비스를 구성합니다.
    pub fn new(jwt: &JwtConfig, policy: AccessPolicy, cache: Cache, stores: Stores) -> Self {
        let tokens = Arc::new(TokenService::new(jwt, cache.clone(), stores.users.clone()));
        let users = UserService::new(stores.users.clone(), stores.roles.clone(), cache.clone());
        let roles = RoleService::new(stores.roles.clone(), stores.users.clone(), cache.clone());
        let orders = OrderService::new(stores.orders.clone(), cache.clone());
        let auth = AuthService::new(tokens.clone(), stores.users, users.clone());

        Self {
            cache,
            tokens,
            policy: Arc::new(policy),
            auth,
            users,
            roles,
            orders,
            db: None,
            tms_backend: None,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 헬스 체크 대상 데이터베이스 설정.
    pub fn with_database(mut self, db: PgStore) -> Self {
        self.db = Some(db);
        self
    }

    /// 헬스 체크 대상 TMS 백엔드 설정. URL이 없으면 그대로 둡니다.
    pub fn with_tms_backend(mut self, config: &TmsBackendConfig) -> Result<Self, reqwest::Error> {
        self.tms_backend = TmsBackendClient::from_config(config)?;
        Ok(self)
    }

    /// 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cache", &self.cache)
            .field("tokens", &self.tokens)
            .field("database", &self.db.is_some())
            .field(
                "tms_backend",
                &self.tms_backend.as_ref().map(TmsBackendClient::health_url),
            )
            .field("started_at", &self.started_at)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// 테스트용 상태 생성 헬퍼.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state(store: Arc<MemoryStore>) -> AppState {
    let jwt = JwtConfig {
        secret: "test-secret-key-for-jwt-testing-minimum-32-chars".to_string(),
        ..Default::default()
    };
    AppState::new(
        &jwt,
        AccessPolicy::default(),
        Cache::in_memory(std::time::Duration::from_secs(300)),
        Stores::memory(store),
    )
}
