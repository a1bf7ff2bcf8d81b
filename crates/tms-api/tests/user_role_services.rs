//! 사용자/역할 서비스 통합 테스트.
//!
//! 권한 집계, 캐시 무효화, 마지막 관리자 보호, 역할 삭제 제약을 확인합니다.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{build_state, TestApp, ADMIN_EMAIL, USER_PASSWORD};
use tms_api::repository::{MemoryStore, UserStore};
use tms_api::services::{CreateRoleDto, CreateUserDto, PermissionsDto, UpdateUserDto};
use tms_api::state::AppState;
use tms_core::{ServiceError, User};
use uuid::Uuid;

fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values
}

#[tokio::test]
async fn test_permissions_follow_role_changes() {
    let app = TestApp::empty();
    let dispatcher = app
        .create_role("dispatcher", &["order:read", "order:update"])
        .await;
    let reporter = app.create_role("reporter", &["report:read", "order:read"]).await;
    let user = app
        .create_user("dispatch@tms.test", &[&dispatcher, &reporter])
        .await;

    let permissions = app.state.users.permissions(user.id).await.unwrap();
    assert_eq!(
        sorted(permissions),
        vec!["order:read", "order:update", "report:read"]
    );

    app.state
        .roles
        .add_permissions(
            dispatcher.id,
            PermissionsDto {
                permissions: vec!["order:create".to_string()],
            },
        )
        .await
        .unwrap();
    app.state
        .roles
        .remove_permissions(
            reporter.id,
            PermissionsDto {
                permissions: vec!["report:read".to_string()],
            },
        )
        .await
        .unwrap();

    let permissions = app.state.users.permissions(user.id).await.unwrap();
    assert_eq!(
        sorted(permissions),
        vec!["order:create", "order:read", "order:update"]
    );

    let holders = app.state.users.users_by_role("Dispatcher").await.unwrap();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].id, user.id);
}

#[tokio::test]
async fn test_all_permissions_and_lookup_by_permission() {
    let app = TestApp::bootstrapped().await;

    let all = app.state.roles.all_permissions().await.unwrap();
    assert!(all.contains(&"*".to_string()));
    assert!(all.contains(&"order:list".to_string()));

    let roles = app
        .state
        .roles
        .roles_by_permission("order:update")
        .await
        .unwrap();
    let mut names: Vec<String> = roles.into_iter().map(|r| r.name).collect();
    names.sort();
    assert_eq!(names, vec!["dispatcher", "driver"]);
}

#[tokio::test]
async fn test_last_admin_cannot_be_deleted_or_deactivated() {
    let app = TestApp::bootstrapped().await;
    let admin = app.state.users.find_by_email(ADMIN_EMAIL).await.unwrap();

    let delete = app.state.users.delete(admin.id).await;
    assert!(matches!(delete, Err(ServiceError::Conflict(_))));

    let deactivate = app.state.users.set_active(admin.id, false).await;
    assert!(matches!(deactivate, Err(ServiceError::Conflict(_))));

    // 두 번째 관리자가 생기면 첫 관리자를 삭제할 수 있음
    let admin_role = app.role("admin").await;
    app.create_user("second-admin@tms.test", &[&admin_role]).await;
    app.state.users.delete(admin.id).await.unwrap();

    let missing = app.state.users.find_by_id(admin.id).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));
}

/// 관리자 두 명이 있는 지연 저장소 상태.
async fn two_admins_on_slow_store() -> (Arc<MemoryStore>, Arc<AppState>, User, User) {
    let store = Arc::new(MemoryStore::with_latency(Duration::from_millis(20)));
    let state = build_state(store.clone());
    let admin_role = state
        .roles
        .create(CreateRoleDto {
            name: "admin".to_string(),
            description: None,
            permissions: Some(vec!["*".to_string()]),
        })
        .await
        .unwrap();

    let mut admins = Vec::new();
    for email in ["first-admin@tms.test", "second-admin@tms.test"] {
        let admin = state
            .users
            .create(CreateUserDto {
                email: email.to_string(),
                password: USER_PASSWORD.to_string(),
                first_name: "Ops".to_string(),
                last_name: "Admin".to_string(),
                is_active: None,
                role_ids: Some(vec![admin_role.id]),
            })
            .await
            .unwrap();
        admins.push(admin);
    }
    let second = admins.pop().unwrap();
    let first = admins.pop().unwrap();
    (store, state, first, second)
}

#[tokio::test]
async fn test_concurrent_admin_deletes_keep_one_admin() {
    let (store, state, first, second) = two_admins_on_slow_store().await;

    let (a, b) = tokio::join!(state.users.delete(first.id), state.users.delete(second.id));

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(ServiceError::Conflict(_)))));
    assert!(store.any_active_admin().await.unwrap());
}

#[tokio::test]
async fn test_concurrent_admin_deactivations_keep_one_admin() {
    let (store, state, first, second) = two_admins_on_slow_store().await;

    let (a, b) = tokio::join!(
        state.users.set_active(first.id, false),
        state.users.set_active(second.id, false)
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert!(store.any_active_admin().await.unwrap());
}

#[tokio::test]
async fn test_role_members_refresh_after_user_writes() {
    let app = TestApp::empty();
    let packer = app.create_role("packer", &["order:read"]).await;
    let loader = app.create_role("loader", &["order:read"]).await;

    // 빈 목록을 먼저 캐시에 올림
    assert!(app.state.roles.users_with_role(packer.id).await.unwrap().is_empty());
    assert!(app.state.roles.users_with_role(loader.id).await.unwrap().is_empty());

    let user = app.create_user("crew@tms.test", &[&packer]).await;
    let members = app.state.roles.users_with_role(packer.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, user.id);

    app.state
        .users
        .update(
            user.id,
            UpdateUserDto {
                role_ids: Some(vec![loader.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(app.state.roles.users_with_role(packer.id).await.unwrap().is_empty());
    assert_eq!(
        app.state.roles.users_with_role(loader.id).await.unwrap().len(),
        1
    );

    app.state.users.delete(user.id).await.unwrap();
    assert!(app.state.roles.users_with_role(loader.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_role_delete_constraints() {
    let app = TestApp::bootstrapped().await;

    let admin_role = app.role("admin").await;
    let protected = app.state.roles.delete(admin_role.id).await;
    assert!(matches!(protected, Err(ServiceError::Conflict(_))));

    let auditor = app.create_role("auditor", &["audit:read"]).await;
    let member = app.create_user("auditor@tms.test", &[&auditor]).await;
    let in_use = app.state.roles.delete(auditor.id).await;
    assert!(matches!(in_use, Err(ServiceError::Conflict(_))));

    let members = app.state.roles.users_with_role(auditor.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, member.id);

    app.state.users.delete(member.id).await.unwrap();
    app.state.roles.delete(auditor.id).await.unwrap();

    let remaining = app.state.roles.find_all().await.unwrap();
    assert!(remaining.iter().all(|r| r.name != "auditor"));
    let lookup = app.state.roles.find_by_id(auditor.id).await;
    assert!(matches!(lookup, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn test_duplicate_email_and_role_name_are_rejected() {
    let app = TestApp::bootstrapped().await;
    let customer = app.role("customer").await;
    app.create_user("dup@tms.test", &[&customer]).await;

    let duplicate = app
        .state
        .users
        .create(CreateUserDto {
            email: " DUP@tms.test ".to_string(),
            password: "Another1!".to_string(),
            first_name: "Dup".to_string(),
            last_name: "User".to_string(),
            is_active: None,
            role_ids: None,
        })
        .await;
    assert!(matches!(duplicate, Err(ServiceError::AlreadyExists(_))));

    let role = app
        .state
        .roles
        .create(CreateRoleDto {
            name: "customer".to_string(),
            description: None,
            permissions: None,
        })
        .await;
    assert!(matches!(role, Err(ServiceError::AlreadyExists(_))));
}

#[tokio::test]
async fn test_unknown_role_id_is_invalid_input() {
    let app = TestApp::empty();

    let result = app
        .state
        .users
        .create(CreateUserDto {
            email: "ghost-role@tms.test".to_string(),
            password: "Passw0rd!".to_string(),
            first_name: "Ghost".to_string(),
            last_name: "Role".to_string(),
            is_active: None,
            role_ids: Some(vec![Uuid::new_v4()]),
        })
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
}

#[tokio::test]
async fn test_invalid_dto_is_rejected_before_storage() {
    let app = TestApp::empty();

    let result = app
        .state
        .users
        .create(CreateUserDto {
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            first_name: String::new(),
            last_name: "User".to_string(),
            is_active: None,
            role_ids: None,
        })
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    assert!(app.state.users.find_all().await.unwrap().is_empty());
}
