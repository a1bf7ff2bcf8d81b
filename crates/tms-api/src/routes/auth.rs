//! 인증 endpoint.
//!
//! - `POST /auth/login` - 로그인 (공개)
//! - `POST /auth/refresh` - 토큰 갱신 (공개)
//! - `POST /auth/logout` - 로그아웃 (Access Token 폐기)
//! - `GET /auth/profile` - 내 프로필
//! - `GET /auth/validate` - 토큰 검증
//! - `POST /auth/change-password` - 비밀번호 변경

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::auth::{JwtAuth, Operation};
use crate::error::{ApiErrorResponse, ApiJson, ApiResult};
use crate::services::{
    ChangePasswordDto, LoginDto, LoginResponse, MessageResponse, RefreshTokenDto, UserProfile,
    ValidateResponse,
};
use crate::state::AppState;

/// 로그인.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginDto,
    responses(
        (status = 200, description = "로그인 성공", body = LoginResponse),
        (status = 400, description = "입력 형식 오류", body = ApiErrorResponse),
        (status = 401, description = "잘못된 자격 증명", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(dto): ApiJson<LoginDto>,
) -> ApiResult<Json<LoginResponse>> {
    state.policy.authorize(None, Operation::AuthLogin)?;
    Ok(Json(state.auth.login(dto).await?))
}

/// 토큰 갱신.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshTokenDto,
    responses(
        (status = 200, description = "갱신 성공", body = LoginResponse),
        (status = 401, description = "유효하지 않은 refresh token", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ApiJson(dto): ApiJson<RefreshTokenDto>,
) -> ApiResult<Json<LoginResponse>> {
    state.policy.authorize(None, Operation::AuthRefresh)?;
    Ok(Json(state.auth.refresh(dto).await?))
}

/// 로그아웃.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "로그아웃 성공", body = MessageResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
) -> ApiResult<Json<MessageResponse>> {
    auth.authorize(&state.policy, Operation::AuthLogout)?;
    Ok(Json(state.auth.logout(&auth.token).await?))
}

/// 내 프로필.
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "프로필", body = UserProfile),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn profile(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
) -> ApiResult<Json<UserProfile>> {
    auth.authorize(&state.policy, Operation::AuthProfile)?;
    Ok(Json(state.auth.profile(auth.claims.sub).await?))
}

/// 토큰 검증.
#[utoipa::path(
    get,
    path = "/api/auth/validate",
    responses(
        (status = 200, description = "유효한 토큰", body = ValidateResponse),
        (status = 401, description = "유효하지 않은 토큰", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn validate(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
) -> ApiResult<Json<ValidateResponse>> {
    auth.authorize(&state.policy, Operation::AuthValidate)?;
    Ok(Json(ValidateResponse::from(auth.claims)))
}

/// 비밀번호 변경.
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordDto,
    responses(
        (status = 200, description = "변경 성공", body = MessageResponse),
        (status = 401, description = "현재 비밀번호 불일치", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiJson(dto): ApiJson<ChangePasswordDto>,
) -> ApiResult<Json<MessageResponse>> {
    auth.authorize(&state.policy, Operation::AuthChangePassword)?;
    Ok(Json(state.auth.change_password(auth.claims.sub, dto).await?))
}

/// 인증 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/profile", get(profile))
        .route("/validate", get(validate))
        .route("/change-password", post(change_password))
}
