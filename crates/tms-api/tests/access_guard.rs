//! 권한 가드 통합 테스트.
//!
//! 실제 로그인으로 받은 클레임에 기본 정책과 설정 재정의를 적용합니다.

mod common;

use common::{TestApp, ADMIN_EMAIL, ADMIN_PASSWORD, USER_PASSWORD};
use tms_api::auth::{AccessPolicy, Operation};
use tms_core::{AccessConfig, AccessRule, ServiceError};

#[tokio::test]
async fn test_customer_can_create_but_not_list_orders() {
    let app = TestApp::bootstrapped().await;
    let customer = app.role("customer").await;
    app.create_user("buyer@tms.test", &[&customer]).await;
    let claims = app.claims(&app.login("buyer@tms.test", USER_PASSWORD).await).await;

    let policy = &app.state.policy;
    assert!(policy.authorize(Some(&claims), Operation::OrderCreate).is_ok());
    assert!(policy.authorize(Some(&claims), Operation::OrderFindOne).is_ok());
    assert!(matches!(
        policy.authorize(Some(&claims), Operation::OrderFindAll),
        Err(ServiceError::Forbidden(_))
    ));
    assert!(matches!(
        policy.authorize(Some(&claims), Operation::UserCreate),
        Err(ServiceError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_admin_passes_every_guarded_operation() {
    let app = TestApp::bootstrapped().await;
    let claims = app.claims(&app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await).await;

    for op in Operation::ALL {
        assert!(
            app.state.policy.authorize(Some(&claims), op).is_ok(),
            "admin denied {}",
            op
        );
    }
}

#[test]
fn test_missing_claims_is_unauthenticated_unless_public() {
    let policy = AccessPolicy::default();

    assert!(matches!(
        policy.authorize(None, Operation::AuthProfile),
        Err(ServiceError::Unauthenticated(_))
    ));
    assert!(matches!(
        policy.authorize(None, Operation::OrderFindAll),
        Err(ServiceError::Unauthenticated(_))
    ));
    assert!(policy.authorize(None, Operation::AuthLogin).is_ok());
    assert!(policy.authorize(None, Operation::HealthCheck).is_ok());
}

#[tokio::test]
async fn test_config_override_matches_roles_case_insensitively() {
    let app = TestApp::bootstrapped().await;
    let driver = app.role("driver").await;
    app.create_user("wheels@tms.test", &[&driver]).await;
    let claims = app.claims(&app.login("wheels@tms.test", USER_PASSWORD).await).await;

    assert!(matches!(
        app.state.policy.authorize(Some(&claims), Operation::OrderFindAll),
        Err(ServiceError::Forbidden(_))
    ));

    let policy = AccessPolicy::from_config(&AccessConfig {
        rules: vec![AccessRule {
            operation: "order.findAll".to_string(),
            roles: vec!["DRIVER".to_string()],
        }],
    })
    .unwrap();
    assert!(policy.authorize(Some(&claims), Operation::OrderFindAll).is_ok());
}

#[test]
fn test_config_with_unknown_operation_is_rejected() {
    let result = AccessPolicy::from_config(&AccessConfig {
        rules: vec![AccessRule {
            operation: "order.teleport".to_string(),
            roles: vec!["admin".to_string()],
        }],
    });
    assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
}

#[test]
fn test_operation_names_round_trip() {
    for op in Operation::ALL {
        let parsed: Operation = op.name().parse().unwrap();
        assert_eq!(parsed, op);
    }
}
