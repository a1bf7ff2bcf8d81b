//! 역할 및 권한 타입.
//!
//! 권한은 독립 엔티티가 아닌 문자열 태그이며 역할에 속합니다.
//! 사용자의 유효 권한은 보유한 모든 역할 권한의 합집합입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// 알려진 역할 이름.
pub mod names {
    pub const ADMIN: &str = "admin";
    pub const SUPER_ADMIN: &str = "super-admin";
    pub const SYSTEM: &str = "system";
    pub const MANAGER: &str = "manager";
    pub const DISPATCHER: &str = "dispatcher";
    pub const DRIVER: &str = "driver";
    pub const CUSTOMER: &str = "customer";
}

/// 관리자급 역할 (마지막 관리자 삭제 가드 대상).
pub const ADMIN_CLASS_ROLES: [&str; 2] = [names::ADMIN, names::SUPER_ADMIN];

/// 삭제할 수 없는 시스템 역할.
pub const PROTECTED_ROLES: [&str; 3] = [names::ADMIN, names::SUPER_ADMIN, names::SYSTEM];

/// 역할 엔티티.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// 역할 ID
    pub id: Uuid,
    /// 고유 역할 이름
    pub name: String,
    /// 설명
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 권한 태그 (중복 없음, 정렬됨)
    #[serde(default)]
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// 특정 권한을 가지는지 확인.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// 관리자급 역할인지 확인.
    pub fn is_admin_class(&self) -> bool {
        is_admin_class(&self.name)
    }

    /// 삭제가 금지된 시스템 역할인지 확인.
    pub fn is_protected(&self) -> bool {
        is_protected_role(&self.name)
    }

    /// 응답용 요약.
    pub fn summary(&self) -> RoleSummary {
        RoleSummary {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// 로그인 응답 등에 포함되는 역할 요약.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RoleSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// 관리자급 역할 이름인지 확인 (대소문자 무시).
pub fn is_admin_class(name: &str) -> bool {
    ADMIN_CLASS_ROLES
        .iter()
        .any(|admin| admin.eq_ignore_ascii_case(name))
}

/// 보호된 시스템 역할 이름인지 확인 (대소문자 무시).
pub fn is_protected_role(name: &str) -> bool {
    PROTECTED_ROLES
        .iter()
        .any(|protected| protected.eq_ignore_ascii_case(name))
}

/// 권한 목록 정규화.
///
/// 앞뒤 공백을 제거하고 빈 값을 버린 뒤 중복 없이 정렬합니다.
pub fn normalize_permissions<I, S>(permissions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    permissions
        .into_iter()
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 여러 역할의 권한 합집합.
///
/// 역할 순서와 무관하게 같은 결과를 반환하며, 중복은 제거됩니다.
pub fn aggregate_permissions<'a, I>(roles: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Role>,
{
    roles
        .into_iter()
        .flat_map(|role| role.permissions.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
