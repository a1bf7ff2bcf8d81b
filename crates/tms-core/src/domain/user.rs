//! 사용자 타입.
//!
//! `User`는 비밀번호 해시를 포함하지 않습니다. 해시는 저장소 계층에서만
//! 다루며 캐시나 응답으로 흘러가지 않습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::{aggregate_permissions, Role, RoleSummary};

/// 사용자 엔티티 (역할 포함).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// 사용자 ID
    pub id: Uuid,
    /// 고유 이메일 (소문자 정규화)
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// 활성 상태
    pub is_active: bool,
    /// 보유 역할
    #[serde(default)]
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// 보유 역할 이름 목록.
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }

    /// 보유 역할 권한의 합집합.
    pub fn permissions(&self) -> Vec<String> {
        aggregate_permissions(&self.roles)
    }

    /// 특정 역할을 보유하는지 확인 (대소문자 무시).
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// 관리자급 역할을 보유하는지 확인.
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(Role::is_admin_class)
    }

    /// 로그인 응답용 요약.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            roles: self.roles.iter().map(Role::summary).collect(),
        }
    }
}

/// 로그인 응답에 포함되는 사용자 요약.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<RoleSummary>,
}

/// 이메일 정규화 (공백 제거, 소문자).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::role::normalize_permissions;

    fn role(name: &str, permissions: &[&str]) -> Role {
        let now = Utc::now();
        Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: Some(format!("{} role", name)),
            permissions: normalize_permissions(permissions),
            created_at: now,
            updated_at: now,
        }
    }

    fn user(roles: Vec<Role>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "kim@example.com".to_string(),
            first_name: "Minji".to_string(),
            last_name: "Kim".to_string(),
            is_active: true,
            roles,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_permissions_are_role_union() {
        let u = user(vec![
            role("dispatcher", &["order:create", "order:read"]),
            role("manager", &["order:read", "user:read"]),
        ]);

        assert_eq!(
            u.permissions(),
            vec!["order:create", "order:read", "user:read"]
        );
        assert_eq!(u.role_names(), vec!["dispatcher", "manager"]);
    }

    #[test]
    fn test_user_admin_detection() {
        assert!(user(vec![role("Admin", &[])]).is_admin());
        assert!(user(vec![role("super-admin", &[])]).is_admin());
        assert!(!user(vec![role("manager", &[])]).is_admin());
        assert!(user(vec![role("Manager", &[])]).has_role("manager"));
    }

    #[test]
    fn test_summary_drops_permissions() {
        let u = user(vec![role("driver", &["order:read"])]);
        let json = serde_json::to_value(u.summary()).unwrap();

        assert_eq!(json["firstName"], "Minji");
        assert_eq!(json["roles"][0]["name"], "driver");
        assert!(json["roles"][0].get("permissions").is_none());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Kim@Example.COM "), "kim@example.com");
    }
}
