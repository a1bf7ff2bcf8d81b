//! 통합 테스트 공용 헬퍼.
//!
//! 메모리 저장소와 메모리 캐시로 전체 서비스 그래프를 구성합니다.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tms_api::auth::{AccessPolicy, Claims};
use tms_api::repository::MemoryStore;
use tms_api::services::{ensure_admin, CreateRoleDto, CreateUserDto, LoginDto};
use tms_api::state::{AppState, Stores};
use tms_cache::Cache;
use tms_core::{BootstrapConfig, JwtConfig, Role, User};

pub const TEST_SECRET: &str = "integration-test-secret-key-with-enough-length";
pub const ADMIN_EMAIL: &str = "admin@tms.test";
pub const ADMIN_PASSWORD: &str = "Admin@123";
pub const USER_PASSWORD: &str = "Passw0rd!";

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: TEST_SECRET.to_string(),
        ..Default::default()
    }
}

pub fn build_state(store: Arc<MemoryStore>) -> Arc<AppState> {
    Arc::new(AppState::new(
        &jwt_config(),
        AccessPolicy::default(),
        Cache::in_memory(Duration::from_secs(300)),
        Stores::memory(store),
    ))
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// 역할 없이 비어 있는 상태.
    pub fn empty() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            state: build_state(store.clone()),
            store,
        }
    }

    /// 표준 역할과 관리자 계정이 준비된 상태.
    pub async fn bootstrapped() -> Self {
        let app = Self::empty();
        let config = BootstrapConfig {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            first_name: "System".to_string(),
            last_name: "Admin".to_string(),
        };
        ensure_admin(&config, app.store.as_ref(), &app.state.users, &app.state.roles)
            .await
            .unwrap()
            .expect("admin should be created on an empty store");
        app
    }

    pub async fn role(&self, name: &str) -> Role {
        self.state.roles.find_by_name(name).await.unwrap()
    }

    pub async fn create_role(&self, name: &str, permissions: &[&str]) -> Role {
        self.state
            .roles
            .create(CreateRoleDto {
                name: name.to_string(),
                description: None,
                permissions: Some(permissions.iter().map(|p| p.to_string()).collect()),
            })
            .await
            .unwrap()
    }

    pub async fn create_user(&self, email: &str, roles: &[&Role]) -> User {
        self.state
            .users
            .create(CreateUserDto {
                email: email.to_string(),
                password: USER_PASSWORD.to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                is_active: None,
                role_ids: Some(roles.iter().map(|r| r.id).collect()),
            })
            .await
            .unwrap()
    }

    /// 로그인 후 Access Token을 반환합니다.
    pub async fn login(&self, email: &str, password: &str) -> String {
        self.state
            .auth
            .login(LoginDto {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .unwrap()
            .tokens
            .access_token
    }

    pub async fn claims(&self, token: &str) -> Claims {
        self.state.tokens.verify_access(token).await.unwrap()
    }
}
