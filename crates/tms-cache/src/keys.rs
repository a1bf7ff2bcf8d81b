//! 캐시 키 네임스페이스.
//!
//! 모든 키는 엔티티 종류별 접두사로 시작합니다. 변경 시에는 접두사 단위로
//! 무효화하므로 새 키를 추가할 때도 반드시 해당 접두사 아래에 두어야 합니다.
//!
//! | 접두사 | 내용 | TTL |
//! |--------|------|-----|
//! | `users:` | 사용자 조회, 권한 집합 | 1시간 |
//! | `roles:` | 역할 조회, 권한 목록 | 1시간 |
//! | `orders:` | 주문 조회 | 1시간 |
//! | `auth:token:` | 발급된 access token 클레임 | access token 수명 |
//! | `auth:revoked:` | 폐기된 토큰 | 토큰 잔여 수명 |

use std::fmt::Display;
use std::time::Duration;

pub const USERS_PREFIX: &str = "users:";
pub const ROLES_PREFIX: &str = "roles:";
pub const ORDERS_PREFIX: &str = "orders:";
pub const AUTH_TOKEN_PREFIX: &str = "auth:token:";
pub const AUTH_REVOKED_PREFIX: &str = "auth:revoked:";
pub const HEALTH_CHECK_PREFIX: &str = "health:check:";

/// 엔티티 조회 결과 TTL.
pub const ENTITY_TTL: Duration = Duration::from_secs(3600);

/// 헬스 체크용 임시 키 TTL.
pub const HEALTH_CHECK_TTL: Duration = Duration::from_secs(5);

// ==================== 사용자 ====================

pub fn user(id: impl Display) -> String {
    format!("{USERS_PREFIX}{id}")
}

pub fn user_by_email(email: &str) -> String {
    format!("{USERS_PREFIX}email:{email}")
}

pub fn user_permissions(id: impl Display) -> String {
    format!("{USERS_PREFIX}{id}:permissions")
}

pub fn users_all() -> String {
    format!("{USERS_PREFIX}all")
}

pub fn users_by_role(role_name: &str) -> String {
    format!("{USERS_PREFIX}role:{}", role_name.to_lowercase())
}

// ==================== 역할 ====================

pub fn role(id: impl Display) -> String {
    format!("{ROLES_PREFIX}{id}")
}

pub fn role_by_name(name: &str) -> String {
    format!("{ROLES_PREFIX}name:{}", name.to_lowercase())
}

pub fn roles_all() -> String {
    format!("{ROLES_PREFIX}all")
}

/// 역할 보유자 목록. 사용자 생성/수정/삭제 시에도 개별로 지워야 합니다.
pub fn role_users(id: impl Display) -> String {
    format!("{ROLES_PREFIX}{id}:users")
}

pub fn roles_permissions() -> String {
    format!("{ROLES_PREFIX}permissions")
}

pub fn roles_by_permission(permission: &str) -> String {
    format!("{ROLES_PREFIX}permission:{permission}")
}

// ==================== 주문 ====================

pub fn order(id: impl Display) -> String {
    format!("{ORDERS_PREFIX}{id}")
}

pub fn orders_all() -> String {
    format!("{ORDERS_PREFIX}all")
}

// ==================== 인증 ====================

/// 발급 토큰 키. `digest`는 원본 토큰의 SHA-256 hex입니다.
pub fn auth_token(digest: &str) -> String {
    format!("{AUTH_TOKEN_PREFIX}{digest}")
}

/// 폐기 토큰 키. `digest`는 원본 토큰의 SHA-256 hex입니다.
pub fn auth_revoked(digest: &str) -> String {
    format!("{AUTH_REVOKED_PREFIX}{digest}")
}

pub fn health_check(nonce: impl Display) -> String {
    format!("{HEALTH_CHECK_PREFIX}{nonce}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_stay_under_their_prefix() {
        let id = "7f1c";
        for key in [
            user(id),
            user_by_email("a@b.c"),
            user_permissions(id),
            users_all(),
            users_by_role("Driver"),
        ] {
            assert!(key.starts_with(USERS_PREFIX), "{key}");
        }
        for key in [
            role(id),
            role_by_name("Admin"),
            roles_all(),
            role_users(id),
            roles_permissions(),
            roles_by_permission("order:read"),
        ] {
            assert!(key.starts_with(ROLES_PREFIX), "{key}");
        }
        assert!(order(id).starts_with(ORDERS_PREFIX));
        assert!(orders_all().starts_with(ORDERS_PREFIX));
    }

    #[test]
    fn test_name_keys_are_case_insensitive() {
        assert_eq!(role_by_name("Dispatcher"), role_by_name("dispatcher"));
        assert_eq!(users_by_role("ADMIN"), "users:role:admin");
    }

    #[test]
    fn test_auth_keys() {
        assert_eq!(auth_token("abc"), "auth:token:abc");
        assert_eq!(auth_revoked("abc"), "auth:revoked:abc");
        assert!(!auth_token("abc").starts_with(AUTH_REVOKED_PREFIX));
    }
}
