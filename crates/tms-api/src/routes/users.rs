//! 사용자 관리 endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use std::sync::Arc;
use tms_core::User;
use uuid::Uuid;

use crate::auth::{JwtAuth, Operation};
use crate::error::{ApiErrorResponse, ApiJson, ApiPath, ApiResult};
use crate::services::{CreateUserDto, SetStatusDto, UpdateUserDto};
use crate::state::AppState;

/// 사용자 생성.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserDto,
    responses(
        (status = 201, description = "생성됨", body = User),
        (status = 400, description = "입력 오류 또는 없는 역할", body = ApiErrorResponse),
        (status = 409, description = "이메일 중복", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiJson(dto): ApiJson<CreateUserDto>,
) -> ApiResult<(StatusCode, Json<User>)> {
    auth.authorize(&state.policy, Operation::UserCreate)?;
    let user = state.users.create(dto).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// 전체 사용자 목록.
#[utoipa::path(
    get,
    path = "/api/users",
    responses((status = 200, description = "사용자 목록", body = Vec<User>)),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
) -> ApiResult<Json<Vec<User>>> {
    auth.authorize(&state.policy, Operation::UserFindAll)?;
    Ok(Json(state.users.find_all().await?))
}

/// ID로 사용자 조회.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    responses(
        (status = 200, description = "사용자", body = User),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<User>> {
    auth.authorize(&state.policy, Operation::UserFindById)?;
    Ok(Json(state.users.find_by_id(id).await?))
}

/// 이메일로 사용자 조회.
#[utoipa::path(
    get,
    path = "/api/users/email/{email}",
    params(("email" = String, Path, description = "이메일")),
    responses(
        (status = 200, description = "사용자", body = User),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user_by_email(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<Json<User>> {
    auth.authorize(&state.policy, Operation::UserFindByEmail)?;
    Ok(Json(state.users.find_by_email(&email).await?))
}

/// 역할별 활성 사용자 조회.
#[utoipa::path(
    get,
    path = "/api/users/role/{name}",
    params(("name" = String, Path, description = "역할 이름")),
    responses((status = 200, description = "사용자 목록", body = Vec<User>)),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users_by_role(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(name): ApiPath<String>,
) -> ApiResult<Json<Vec<User>>> {
    auth.authorize(&state.policy, Operation::UserFindByRole)?;
    Ok(Json(state.users.users_by_role(&name).await?))
}

/// 사용자 부분 수정.
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    request_body = UpdateUserDto,
    responses(
        (status = 200, description = "수정됨", body = User),
        (status = 404, description = "없음", body = ApiErrorResponse),
        (status = 409, description = "이메일 중복 또는 마지막 관리자", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<UpdateUserDto>,
) -> ApiResult<Json<User>> {
    auth.authorize(&state.policy, Operation::UserUpdate)?;
    Ok(Json(state.users.update(id, dto).await?))
}

/// 사용자 삭제.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    responses(
        (status = 204, description = "삭제됨"),
        (status = 404, description = "없음", body = ApiErrorResponse),
        (status = 409, description = "마지막 관리자", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    auth.authorize(&state.policy, Operation::UserDelete)?;
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 사용자 유효 권한.
#[utoipa::path(
    get,
    path = "/api/users/{id}/permissions",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    responses(
        (status = 200, description = "권한 목록", body = Vec<String>),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user_permissions(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<String>>> {
    auth.authorize(&state.policy, Operation::UserPermissions)?;
    Ok(Json(state.users.permissions(id).await?))
}

/// 활성 상태 변경.
#[utoipa::path(
    patch,
    path = "/api/users/{id}/status",
    params(("id" = Uuid, Path, description = "사용자 ID")),
    request_body = SetStatusDto,
    responses(
        (status = 200, description = "변경됨", body = User),
        (status = 409, description = "마지막 관리자", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn set_user_status(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<SetStatusDto>,
) -> ApiResult<Json<User>> {
    auth.authorize(&state.policy, Operation::UserSetStatus)?;
    Ok(Json(state.users.set_active(id, dto.is_active).await?))
}

/// 사용자 라우터 생성.
pub fn users_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/email/{email}", get(get_user_by_email))
        .route("/role/{name}", get(list_users_by_role))
        .route(
            "/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/{id}/permissions", get(get_user_permissions))
        .route("/{id}/status", patch(set_user_status))
}
