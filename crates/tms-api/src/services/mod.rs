//! 도메인 서비스.
//!
//! HTTP 라우트와 RPC 디스패처가 같은 서비스를 공유합니다. 서비스는 전송 계층을
//! 모르며 모든 실패를 [`ServiceError`]로 반환합니다.
//!
//! # 캐시 정책
//!
//! - 조회: 결정적 키로 캐시를 먼저 확인하고, 미스 시 저장소에서 읽어 채웁니다.
//! - 변경: 저장소에 먼저 반영한 뒤 엔티티 접두사 전체를 무효화합니다.
//!   역할 변경은 사용자 투영(역할/권한 포함)도 함께 무효화합니다.

pub mod auth;
pub mod bootstrap;
pub mod order;
pub mod role;
pub mod user;

pub use auth::{
    AuthService, LoginDto, LoginResponse, MessageResponse, RefreshTokenDto, UserProfile,
    ValidateResponse,
};
pub use bootstrap::ensure_admin;
pub use order::{
    AddressDto, CreateOrderDto, OrderService, UpdateOrderStatusDto, UpdatePaymentStatusDto,
};
pub use role::{CreateRoleDto, PermissionsDto, RoleService, UpdateRoleDto};
pub use user::{ChangePasswordDto, CreateUserDto, SetStatusDto, UpdateUserDto, UserService};

use tms_core::ServiceError;
use validator::{Validate, ValidationErrors};

/// 입력 DTO를 검증합니다.
pub(crate) fn validate<T: Validate>(dto: &T) -> Result<(), ServiceError> {
    dto.validate().map_err(validation_error)
}

/// 검증 에러를 `InvalidInput`으로 변환합니다.
///
/// 필드별 메시지를 `; `로 이어 붙입니다.
pub(crate) fn validation_error(errors: ValidationErrors) -> ServiceError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect();
    messages.sort();

    if messages.is_empty() {
        messages.push(errors.to_string());
    }
    ServiceError::InvalidInput(messages.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct SignupForm {
        #[validate(email(message = "이메일 형식이 올바르지 않습니다"))]
        email: String,
        #[validate(length(min = 6))]
        password: String,
    }

    #[test]
    fn test_validation_error_collects_messages() {
        let form = SignupForm {
            email: "nope".to_string(),
            password: "123".to_string(),
        };

        let Err(ServiceError::InvalidInput(message)) = validate(&form) else {
            panic!("expected InvalidInput");
        };
        assert!(message.contains("이메일 형식이 올바르지 않습니다"));
        assert!(message.contains("password: 유효하지 않은 값"));
    }
}
