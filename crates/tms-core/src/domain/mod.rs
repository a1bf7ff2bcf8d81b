//! TMS 미들웨어 도메인 모델.

mod order;
pub mod role;
mod user;

pub use order::*;
pub use role::{
    aggregate_permissions, is_admin_class, is_protected_role, normalize_permissions, Role,
    RoleSummary, ADMIN_CLASS_ROLES, PROTECTED_ROLES,
};
pub use user::*;
