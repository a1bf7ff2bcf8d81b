//! 인증 서비스.
//!
//! 로그인/토큰 갱신/로그아웃과 프로필 조회를 담당합니다. 토큰 발급과 검증은
//! [`TokenService`]에 위임합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tms_core::{normalize_email, RoleSummary, ServiceError, ServiceResult, User, UserSummary};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::user::{ChangePasswordDto, UserService};
use super::validate;
use crate::auth::{verify_password_blocking, Claims, TokenPair, TokenService};
use crate::repository::UserStore;

// ==================== 요청 ====================

/// 로그인 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginDto {
    #[validate(email(message = "이메일 형식이 올바르지 않습니다"))]
    pub email: String,
    #[validate(length(min = 6, message = "비밀번호는 최소 6자 이상이어야 합니다"))]
    pub password: String,
}

/// 토큰 갱신 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RefreshTokenDto {
    #[validate(length(min = 1, message = "refresh_token이 필요합니다"))]
    pub refresh_token: String,
}

// ==================== 응답 ====================

/// 로그인/갱신 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user: UserSummary,
}

/// 프로필 응답 (역할 요약 + 유효 권한).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub roles: Vec<RoleSummary>,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 토큰 검증 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    /// 만료 시각 (Unix timestamp)
    pub expires_at: i64,
}

impl From<Claims> for ValidateResponse {
    fn from(claims: Claims) -> Self {
        Self {
            valid: true,
            user_id: claims.sub,
            email: claims.email,
            roles: claims.roles,
            permissions: claims.permissions,
            expires_at: claims.exp,
        }
    }
}

/// 단순 메시지 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ==================== 서비스 ====================

/// 인증 서비스.
#[derive(Clone)]
pub struct AuthService {
    tokens: Arc<TokenService>,
    users: Arc<dyn UserStore>,
    user_service: UserService,
}

impl AuthService {
    pub fn new(tokens: Arc<TokenService>, users: Arc<dyn UserStore>, user_service: UserService) -> Self {
        Self {
            tokens,
            users,
            user_service,
        }
    }

    /// 자격 증명을 확인합니다.
    ///
    /// 사용자가 없거나, 비활성이거나, 비밀번호가 다르면 모두 같은
    /// `InvalidCredentials`를 반환합니다.
    pub async fn validate_user(&self, email: &str, password: &str) -> ServiceResult<User> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidCredentials);
        }

        let Some((user, password_hash)) = self.users.find_credentials_by_email(&email).await? else {
            warn!("Login rejected: unknown email");
            return Err(ServiceError::InvalidCredentials);
        };

        if !user.is_active {
            warn!(user_id = %user.id, "Login rejected: user inactive");
            return Err(ServiceError::InvalidCredentials);
        }

        if !verify_password_blocking(password.to_string(), password_hash).await? {
            warn!(user_id = %user.id, "Login rejected: password mismatch");
            return Err(ServiceError::InvalidCredentials);
        }

        Ok(user)
    }

    /// 로그인. 자격 증명을 확인하고 토큰 쌍을 발급합니다.
    pub async fn login(&self, dto: LoginDto) -> ServiceResult<LoginResponse> {
        validate(&dto)?;
        let user = self.validate_user(&dto.email, &dto.password).await?;
        let tokens = self.tokens.issue_token_pair(&user).await?;

        info!(user_id = %user.id, roles = ?user.role_names(), "User logged in");
        Ok(LoginResponse {
            tokens,
            user: user.summary(),
        })
    }

    /// Refresh Token으로 새 토큰 쌍을 발급합니다.
    pub async fn refresh(&self, dto: RefreshTokenDto) -> ServiceResult<LoginResponse> {
        validate(&dto)?;
        let (tokens, user) = self.tokens.refresh(&dto.refresh_token).await?;
        Ok(LoginResponse {
            tokens,
            user: user.summary(),
        })
    }

    /// 로그아웃. Access Token을 폐기합니다.
    pub async fn logout(&self, token: &str) -> ServiceResult<MessageResponse> {
        self.tokens.revoke(token).await?;
        info!("User logged out");
        Ok(MessageResponse::new("Logged out successfully"))
    }

    /// 프로필 조회. 권한은 현재 역할 기준으로 계산됩니다.
    pub async fn profile(&self, user_id: Uuid) -> ServiceResult<UserProfile> {
        let user = self.user_service.find_by_id(user_id).await?;
        let permissions = self.user_service.permissions(user_id).await?;

        Ok(UserProfile {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: user.is_active,
            roles: user.roles.iter().map(|r| r.summary()).collect(),
            permissions,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }

    /// 본인 비밀번호 변경.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        dto: ChangePasswordDto,
    ) -> ServiceResult<MessageResponse> {
        self.user_service.change_password(user_id, dto).await?;
        Ok(MessageResponse::new("Password changed successfully"))
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
