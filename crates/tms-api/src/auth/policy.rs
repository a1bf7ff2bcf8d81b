//! 작업별 접근 정책 (권한 가드).
//!
//! 각 작업은 [`Access`] 규칙 하나를 가집니다. 역할 사이에 계층은 없으며
//! 관리자도 허용 목록에 명시된 작업에만 접근할 수 있습니다.
//!
//! 기본 규칙은 [`Operation::default_access`]에 있고, 설정의 `access.rules`로
//! 작업 단위 재정의가 가능합니다.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tms_core::domain::role::names::{ADMIN, CUSTOMER, DISPATCHER, DRIVER, MANAGER};
use tms_core::{AccessConfig, ServiceError, ServiceResult};
use tracing::warn;

use super::Claims;

/// 보호 대상 작업.
///
/// 이름은 RPC 패턴과 같습니다 (HTTP 전용 작업도 같은 형식).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    // 인증
    AuthLogin,
    AuthRefresh,
    AuthValidateUser,
    AuthValidate,
    AuthProfile,
    AuthLogout,
    AuthChangePassword,
    // 사용자
    UserCreate,
    UserFindAll,
    UserFindById,
    UserFindByEmail,
    UserUpdate,
    UserDelete,
    UserPermissions,
    UserSetStatus,
    UserFindByRole,
    // 역할
    RoleCreate,
    RoleFindAll,
    RoleFindById,
    RoleFindByName,
    RoleUpdate,
    RoleDelete,
    RoleAddPermissions,
    RoleRemovePermissions,
    RoleSetPermissions,
    RoleUsers,
    RoleAllPermissions,
    RoleFindByPermission,
    // 주문
    OrderCreate,
    OrderFindAll,
    OrderFindOne,
    OrderUpdateStatus,
    OrderUpdatePayment,
    OrderRemove,
    // 헬스 체크
    HealthCheck,
    HealthDetailed,
    HealthRedis,
    HealthLiveness,
    HealthReadiness,
}

/// 작업 접근 규칙.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// 토큰 불필요
    Public,
    /// 유효한 토큰이면 허용
    Authenticated,
    /// 나열된 역할 중 하나를 가져야 허용 (소문자로 저장)
    Roles(Vec<String>),
}

impl Access {
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Access::Roles(
            roles
                .into_iter()
                .map(|r| r.as_ref().trim().to_lowercase())
                .collect(),
        )
    }
}

impl Operation {
    pub const ALL: [Operation; 39] = [
        Operation::AuthLogin,
        Operation::AuthRefresh,
        Operation::AuthValidateUser,
        Operation::AuthValidate,
        Operation::AuthProfile,
        Operation::AuthLogout,
        Operation::AuthChangePassword,
        Operation::UserCreate,
        Operation::UserFindAll,
        Operation::UserFindById,
        Operation::UserFindByEmail,
        Operation::UserUpdate,
        Operation::UserDelete,
        Operation::UserPermissions,
        Operation::UserSetStatus,
        Operation::UserFindByRole,
        Operation::RoleCreate,
        Operation::RoleFindAll,
        Operation::RoleFindById,
        Operation::RoleFindByName,
        Operation::RoleUpdate,
        Operation::RoleDelete,
        Operation::RoleAddPermissions,
        Operation::RoleRemovePermissions,
        Operation::RoleSetPermissions,
        Operation::RoleUsers,
        Operation::RoleAllPermissions,
        Operation::RoleFindByPermission,
        Operation::OrderCreate,
        Operation::OrderFindAll,
        Operation::OrderFindOne,
        Operation::OrderUpdateStatus,
        Operation::OrderUpdatePayment,
        Operation::OrderRemove,
        Operation::HealthCheck,
        Operation::HealthDetailed,
        Operation::HealthRedis,
        Operation::HealthLiveness,
        Operation::HealthReadiness,
    ];

    /// 작업 이름 (`user.create` 형식).
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AuthLogin => "auth.login",
            Operation::AuthRefresh => "auth.refresh",
            Operation::AuthValidateUser => "auth.validateUser",
            Operation::AuthValidate => "auth.validate",
            Operation::AuthProfile => "auth.getProfile",
            Operation::AuthLogout => "auth.logout",
            Operation::AuthChangePassword => "auth.changePassword",
            Operation::UserCreate => "user.create",
            Operation::UserFindAll => "user.findAll",
            Operation::UserFindById => "user.findById",
            Operation::UserFindByEmail => "user.findByEmail",
            Operation::UserUpdate => "user.update",
            Operation::UserDelete => "user.delete",
            Operation::UserPermissions => "user.getUserPermissions",
            Operation::UserSetStatus => "user.setStatus",
            Operation::UserFindByRole => "user.findByRole",
            Operation::RoleCreate => "role.create",
            Operation::RoleFindAll => "role.findAll",
            Operation::RoleFindById => "role.findById",
            Operation::RoleFindByName => "role.findByName",
            Operation::RoleUpdate => "role.update",
            Operation::RoleDelete => "role.delete",
            Operation::RoleAddPermissions => "role.addPermissions",
            Operation::RoleRemovePermissions => "role.removePermissions",
            Operation::RoleSetPermissions => "role.setPermissions",
            Operation::RoleUsers => "role.getUsersWithRole",
            Operation::RoleAllPermissions => "role.getAllPermissions",
            Operation::RoleFindByPermission => "role.findByPermission",
            Operation::OrderCreate => "order.create",
            Operation::OrderFindAll => "order.findAll",
            Operation::OrderFindOne => "order.findOne",
            Operation::OrderUpdateStatus => "order.updateStatus",
            Operation::OrderUpdatePayment => "order.updatePaymentStatus",
            Operation::OrderRemove => "order.remove",
            Operation::HealthCheck => "health.check",
            Operation::HealthDetailed => "health.detailed",
            Operation::HealthRedis => "health.redis",
            Operation::HealthLiveness => "health.liveness",
            Operation::HealthReadiness => "health.readiness",
        }
    }

    /// 내장 기본 규칙.
    pub fn default_access(&self) -> Access {
        use Operation::*;
        match self {
            AuthLogin | AuthRefresh | AuthValidateUser => Access::Public,
            AuthValidate | AuthProfile | AuthLogout | AuthChangePassword => Access::Authenticated,

            UserCreate | UserFindAll | UserUpdate | UserDelete | UserSetStatus => {
                Access::roles([ADMIN])
            }
            UserFindById | UserFindByEmail | UserPermissions | UserFindByRole => {
                Access::roles([ADMIN, MANAGER])
            }

            RoleCreate | RoleUpdate | RoleDelete | RoleAddPermissions | RoleRemovePermissions
            | RoleSetPermissions => Access::roles([ADMIN]),
            RoleFindAll | RoleFindById | RoleFindByName | RoleUsers | RoleAllPermissions
            | RoleFindByPermission => Access::roles([ADMIN, MANAGER]),

            OrderCreate => Access::roles([ADMIN, MANAGER, DISPATCHER, CUSTOMER]),
            OrderFindAll => Access::roles([ADMIN, MANAGER, DISPATCHER]),
            OrderFindOne => Access::roles([ADMIN, MANAGER, DISPATCHER, DRIVER, CUSTOMER]),
            OrderUpdateStatus => Access::roles([ADMIN, MANAGER, DISPATCHER, DRIVER]),
            OrderUpdatePayment | OrderRemove => Access::roles([ADMIN, MANAGER]),

            HealthCheck | HealthDetailed | HealthRedis | HealthLiveness | HealthReadiness => {
                Access::Public
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .find(|op| op.name() == s)
            .copied()
            .ok_or_else(|| ServiceError::InvalidInput(format!("알 수 없는 작업: {}", s)))
    }
}

/// 작업 → 접근 규칙 맵.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: HashMap<Operation, Access>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            rules: Operation::ALL
                .iter()
                .map(|op| (*op, op.default_access()))
                .collect(),
        }
    }
}

impl AccessPolicy {
    /// 기본 규칙에 설정 재정의를 적용합니다.
    ///
    /// 알 수 없는 작업 이름은 `InvalidInput`입니다.
    pub fn from_config(config: &AccessConfig) -> ServiceResult<Self> {
        let mut policy = Self::default();
        for rule in &config.rules {
            let operation: Operation = rule.operation.parse()?;
            policy.set(operation, Access::roles(&rule.roles));
        }
        Ok(policy)
    }

    /// 규칙 재정의.
    pub fn set(&mut self, operation: Operation, access: Access) {
        self.rules.insert(operation, access);
    }

    pub fn access(&self, operation: Operation) -> Access {
        self.rules
            .get(&operation)
            .cloned()
            .unwrap_or_else(|| operation.default_access())
    }

    /// 공개 작업인지 확인.
    pub fn is_public(&self, operation: Operation) -> bool {
        matches!(self.rules.get(&operation), Some(Access::Public))
    }

    /// 호출자가 작업을 수행할 수 있는지 판정합니다.
    ///
    /// - 공개 작업: 항상 허용
    /// - 클레임 없음: `Unauthenticated`
    /// - 역할 교집합 없음: `Forbidden`
    pub fn authorize(&self, claims: Option<&Claims>, operation: Operation) -> ServiceResult<()> {
        match self.access(operation) {
            Access::Public => Ok(()),
            _ if claims.is_none() => {
                warn!(operation = %operation, "Access denied: missing credentials");
                Err(ServiceError::Unauthenticated("인증 토큰이 필요합니다".to_string()))
            }
            Access::Authenticated => Ok(()),
            Access::Roles(allowed) => {
                let Some(claims) = claims else {
                    return Err(ServiceError::Unauthenticated(
                        "인증 토큰이 필요합니다".to_string(),
                    ));
                };
                if allowed.iter().any(|role| claims.has_role(role)) {
                    Ok(())
                } else {
                    warn!(
                        operation = %operation,
                        user_id = %claims.sub,
                        roles = ?claims.roles,
                        "Access denied: role not permitted"
                    );
                    Err(ServiceError::Forbidden(format!(
                        "'{}' 작업에 필요한 역할이 없습니다",
                        operation
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenKind;
    use tms_core::AccessRule;
    use uuid::Uuid;

    fn claims(roles: &[&str]) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: Vec::new(),
            iat: 0,
            exp: i64::MAX,
            jti: "jti".to_string(),
            token_type: TokenKind::Access,
            iss: None,
        }
    }

    #[test]
    fn test_operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
        }
        assert!("user.explode".parse::<Operation>().is_err());
    }

    #[test]
    fn test_public_operations_need_no_claims() {
        let policy = AccessPolicy::default();
        assert!(policy.authorize(None, Operation::AuthLogin).is_ok());
        assert!(policy.authorize(None, Operation::HealthCheck).is_ok());
        assert!(policy.is_public(Operation::AuthRefresh));
    }

    #[test]
    fn test_missing_claims_fail_closed() {
        let policy = AccessPolicy::default();
        assert!(matches!(
            policy.authorize(None, Operation::AuthProfile),
            Err(ServiceError::Unauthenticated(_))
        ));
        assert!(matches!(
            policy.authorize(None, Operation::UserFindAll),
            Err(ServiceError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_role_intersection() {
        let policy = AccessPolicy::default();
        let driver = claims(&["driver"]);
        let manager = claims(&["Manager"]);

        assert!(policy.authorize(Some(&driver), Operation::OrderUpdateStatus).is_ok());
        assert!(matches!(
            policy.authorize(Some(&driver), Operation::OrderRemove),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(policy.authorize(Some(&manager), Operation::UserFindById).is_ok());
        assert!(policy.authorize(Some(&manager), Operation::UserDelete).is_err());
    }

    #[test]
    fn test_admin_has_no_implicit_bypass() {
        let mut policy = AccessPolicy::default();
        policy.set(Operation::OrderUpdateStatus, Access::roles(["driver"]));

        let admin = claims(&["admin"]);
        assert!(matches!(
            policy.authorize(Some(&admin), Operation::OrderUpdateStatus),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn test_config_overrides() {
        let config = AccessConfig {
            rules: vec![AccessRule {
                operation: "order.findAll".to_string(),
                roles: vec!["Driver".to_string()],
            }],
        };
        let policy = AccessPolicy::from_config(&config).unwrap();

        assert_eq!(policy.access(Operation::OrderFindAll), Access::roles(["driver"]));
        assert!(policy
            .authorize(Some(&claims(&["driver"])), Operation::OrderFindAll)
            .is_ok());

        let bad = AccessConfig {
            rules: vec![AccessRule {
                operation: "nope".to_string(),
                roles: vec![],
            }],
        };
        assert!(AccessPolicy::from_config(&bad).is_err());
    }
}
