//! 역할 관리 endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tms_core::{Role, User};
use uuid::Uuid;

use crate::auth::{JwtAuth, Operation};
use crate::error::{ApiErrorResponse, ApiJson, ApiPath, ApiResult};
use crate::services::{CreateRoleDto, PermissionsDto, UpdateRoleDto};
use crate::state::AppState;

/// 역할 생성.
#[utoipa::path(
    post,
    path = "/api/roles",
    request_body = CreateRoleDto,
    responses(
        (status = 201, description = "생성됨", body = Role),
        (status = 409, description = "이름 중복", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiJson(dto): ApiJson<CreateRoleDto>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    auth.authorize(&state.policy, Operation::RoleCreate)?;
    let role = state.roles.create(dto).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// 전체 역할 목록.
#[utoipa::path(
    get,
    path = "/api/roles",
    responses((status = 200, description = "역할 목록", body = Vec<Role>)),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
) -> ApiResult<Json<Vec<Role>>> {
    auth.authorize(&state.policy, Operation::RoleFindAll)?;
    Ok(Json(state.roles.find_all().await?))
}

/// 모든 역할의 권한 합집합.
#[utoipa::path(
    get,
    path = "/api/roles/permissions",
    responses((status = 200, description = "권한 목록", body = Vec<String>)),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn list_all_permissions(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
) -> ApiResult<Json<Vec<String>>> {
    auth.authorize(&state.policy, Operation::RoleAllPermissions)?;
    Ok(Json(state.roles.all_permissions().await?))
}

/// 특정 권한을 가진 역할.
#[utoipa::path(
    get,
    path = "/api/roles/permission/{permission}",
    params(("permission" = String, Path, description = "권한 태그")),
    responses((status = 200, description = "역할 목록", body = Vec<Role>)),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn list_roles_by_permission(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(permission): ApiPath<String>,
) -> ApiResult<Json<Vec<Role>>> {
    auth.authorize(&state.policy, Operation::RoleFindByPermission)?;
    Ok(Json(state.roles.roles_by_permission(&permission).await?))
}

/// 이름으로 역할 조회.
#[utoipa::path(
    get,
    path = "/api/roles/name/{name}",
    params(("name" = String, Path, description = "역할 이름")),
    responses(
        (status = 200, description = "역할", body = Role),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn get_role_by_name(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(name): ApiPath<String>,
) -> ApiResult<Json<Role>> {
    auth.authorize(&state.policy, Operation::RoleFindByName)?;
    Ok(Json(state.roles.find_by_name(&name).await?))
}

/// ID로 역할 조회.
#[utoipa::path(
    get,
    path = "/api/roles/{id}",
    params(("id" = Uuid, Path, description = "역할 ID")),
    responses(
        (status = 200, description = "역할", body = Role),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Role>> {
    auth.authorize(&state.policy, Operation::RoleFindById)?;
    Ok(Json(state.roles.find_by_id(id).await?))
}

/// 역할 부분 수정.
#[utoipa::path(
    patch,
    path = "/api/roles/{id}",
    params(("id" = Uuid, Path, description = "역할 ID")),
    request_body = UpdateRoleDto,
    responses(
        (status = 200, description = "수정됨", body = Role),
        (status = 409, description = "이름 중복 또는 시스템 역할", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<UpdateRoleDto>,
) -> ApiResult<Json<Role>> {
    auth.authorize(&state.policy, Operation::RoleUpdate)?;
    Ok(Json(state.roles.update(id, dto).await?))
}

/// 역할 삭제.
#[utoipa::path(
    delete,
    path = "/api/roles/{id}",
    params(("id" = Uuid, Path, description = "역할 ID")),
    responses(
        (status = 204, description = "삭제됨"),
        (status = 409, description = "보유자 존재 또는 시스템 역할", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    auth.authorize(&state.policy, Operation::RoleDelete)?;
    state.roles.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 권한 추가.
#[utoipa::path(
    post,
    path = "/api/roles/{id}/permissions",
    params(("id" = Uuid, Path, description = "역할 ID")),
    request_body = PermissionsDto,
    responses((status = 200, description = "수정된 역할", body = Role)),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn add_permissions(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<PermissionsDto>,
) -> ApiResult<Json<Role>> {
    auth.authorize(&state.policy, Operation::RoleAddPermissions)?;
    Ok(Json(state.roles.add_permissions(id, dto).await?))
}

/// 권한 제거.
#[utoipa::path(
    delete,
    path = "/api/roles/{id}/permissions",
    params(("id" = Uuid, Path, description = "역할 ID")),
    request_body = PermissionsDto,
    responses((status = 200, description = "수정된 역할", body = Role)),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn remove_permissions(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<PermissionsDto>,
) -> ApiResult<Json<Role>> {
    auth.authorize(&state.policy, Operation::RoleRemovePermissions)?;
    Ok(Json(state.roles.remove_permissions(id, dto).await?))
}

/// 권한 목록 교체.
#[utoipa::path(
    put,
    path = "/api/roles/{id}/permissions",
    params(("id" = Uuid, Path, description = "역할 ID")),
    request_body = PermissionsDto,
    responses((status = 200, description = "수정된 역할", body = Role)),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn set_permissions(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<PermissionsDto>,
) -> ApiResult<Json<Role>> {
    auth.authorize(&state.policy, Operation::RoleSetPermissions)?;
    Ok(Json(state.roles.set_permissions(id, dto.permissions).await?))
}

/// 역할 보유 사용자.
#[utoipa::path(
    get,
    path = "/api/roles/{id}/users",
    params(("id" = Uuid, Path, description = "역할 ID")),
    responses((status = 200, description = "사용자 목록", body = Vec<User>)),
    security(("bearer_auth" = [])),
    tag = "roles"
)]
pub async fn list_role_users(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<User>>> {
    auth.authorize(&state.policy, Operation::RoleUsers)?;
    Ok(Json(state.roles.users_with_role(id).await?))
}

/// 역할 라우터 생성.
pub fn roles_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/permissions", get(list_all_permissions))
        .route("/permission/{permission}", get(list_roles_by_permission))
        .route("/name/{name}", get(get_role_by_name))
        .route("/{id}", get(get_role).patch(update_role).delete(delete_role))
        .route(
            "/{id}/permissions",
            post(add_permissions)
                .delete(remove_permissions)
                .put(set_permissions),
        )
        .route("/{id}/users", get(list_role_users))
}
