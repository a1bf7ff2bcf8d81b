//! RPC 패턴 디스패처.
//!
//! 패턴 이름을 [`Operation`]으로 해석하고 HTTP 라우트와 같은 가드와 서비스를
//! 호출합니다. 모든 호출은 `call_timeout` 안에 끝나야 하며, 넘기면
//! `Unavailable`로 응답합니다.
//!
//! # 입력 형식
//!
//! - 단일 식별자: `"<uuid>"` 또는 `{"id": "<uuid>"}`
//! - 대상 + 본문: `{"id": "...", "updateUserDto": {...}}` 또는 본문 필드를 펼친
//!   `{"id": "...", "firstName": "..."}`

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tms_core::{ServiceError, ServiceResult};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use super::envelope::{RpcRequest, RpcResponse};
use crate::auth::{Claims, Operation};
use crate::metrics::record_rpc_call;
use crate::routes::{cache_status, health_report, LivenessResponse};
use crate::services::{
    ChangePasswordDto, CreateOrderDto, CreateRoleDto, CreateUserDto, LoginDto, MessageResponse,
    PermissionsDto, RefreshTokenDto, SetStatusDto, UpdateOrderStatusDto, UpdatePaymentStatusDto,
    UpdateRoleDto, UpdateUserDto, ValidateResponse,
};
use crate::state::AppState;

/// 패턴 → 서비스 호출.
#[derive(Clone)]
pub struct RpcDispatcher {
    state: Arc<AppState>,
    call_timeout: Duration,
}

impl RpcDispatcher {
    pub fn new(state: Arc<AppState>, call_timeout: Duration) -> Self {
        Self {
            state,
            call_timeout,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// 원시 프레임 하나를 처리합니다.
    ///
    /// JSON 파싱 실패도 `INVALID_INPUT` 응답으로 돌려줍니다.
    pub async fn handle_frame(&self, frame: &str) -> RpcResponse {
        match serde_json::from_str::<RpcRequest>(frame) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                debug!(error = %e, "Malformed RPC frame");
                RpcResponse::failure(
                    None,
                    &ServiceError::InvalidInput(format!("잘못된 요청 형식: {}", e)),
                )
            }
        }
    }

    /// 요청 하나를 처리합니다.
    #[instrument(
        skip(self, request),
        fields(pattern = %request.pattern, request_id = ?request.id)
    )]
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let started = Instant::now();
        let id = request.id.clone();
        let label = request
            .pattern
            .parse::<Operation>()
            .map(|op| op.name())
            .unwrap_or("unknown");

        let result = match tokio::time::timeout(self.call_timeout, self.dispatch(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "RPC call timed out"
                );
                Err(ServiceError::Unavailable(format!(
                    "{}ms 안에 응답하지 못했습니다",
                    self.call_timeout.as_millis()
                )))
            }
        };

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => {
                debug!(elapsed_ms = elapsed.as_millis() as u64, "RPC call completed");
                record_rpc_call(label, "ok", elapsed.as_secs_f64());
            }
            Err(e) => {
                if matches!(e, ServiceError::Internal(_)) {
                    error!(error = %e, "RPC call failed");
                } else {
                    debug!(code = e.code(), "RPC call rejected");
                }
                record_rpc_call(label, e.code(), elapsed.as_secs_f64());
            }
        }

        match result {
            Ok(data) => RpcResponse::ok(id, data),
            Err(e) => RpcResponse::failure(id, &e),
        }
    }

    /// 토큰 검증, 권한 가드, 서비스 호출.
    async fn dispatch(&self, request: RpcRequest) -> ServiceResult<Value> {
        let operation: Operation = request.pattern.parse()?;
        let token = request.token.as_deref().map(strip_bearer);

        let claims = match token {
            Some(token) if !self.state.policy.is_public(operation) => {
                Some(self.state.tokens.verify_access(token).await?)
            }
            _ => None,
        };
        self.state.policy.authorize(claims.as_ref(), operation)?;

        self.call(operation, claims, token, request.data).await
    }

    async fn call(
        &self,
        operation: Operation,
        claims: Option<Claims>,
        token: Option<&str>,
        data: Value,
    ) -> ServiceResult<Value> {
        let state = &self.state;

        match operation {
            // ==================== 인증 ====================
            Operation::AuthLogin => reply(state.auth.login(parse::<LoginDto>(data)?).await?),
            Operation::AuthRefresh => {
                reply(state.auth.refresh(parse::<RefreshTokenDto>(data)?).await?)
            }
            Operation::AuthValidateUser => {
                let dto: LoginDto = parse(data)?;
                reply(state.auth.validate_user(&dto.email, &dto.password).await?)
            }
            Operation::AuthValidate => reply(ValidateResponse::from(require(claims)?)),
            Operation::AuthProfile => reply(state.auth.profile(require(claims)?.sub).await?),
            Operation::AuthLogout => {
                let token = token.ok_or_else(missing_token)?;
                reply(state.auth.logout(token).await?)
            }
            Operation::AuthChangePassword => {
                let user_id = require(claims)?.sub;
                let dto: ChangePasswordDto = parse(data)?;
                reply(state.auth.change_password(user_id, dto).await?)
            }

            // ==================== 사용자 ====================
            Operation::UserCreate => {
                let dto: CreateUserDto = arg(data, "createUserDto")?;
                reply(state.users.create(dto).await?)
            }
            Operation::UserFindAll => reply(state.users.find_all().await?),
            Operation::UserFindById => reply(state.users.find_by_id(arg(data, "id")?).await?),
            Operation::UserFindByEmail => {
                let email: String = arg(data, "email")?;
                reply(state.users.find_by_email(&email).await?)
            }
            Operation::UserUpdate => {
                let (id, dto) = targeted::<UpdateUserDto>(data, "updateUserDto")?;
                reply(state.users.update(id, dto).await?)
            }
            Operation::UserDelete => {
                state.users.delete(arg(data, "id")?).await?;
                reply(MessageResponse::new("User deleted successfully"))
            }
            Operation::UserPermissions => {
                reply(state.users.permissions(arg(data, "id")?).await?)
            }
            Operation::UserSetStatus => {
                let (id, dto) = targeted::<SetStatusDto>(data, "setStatusDto")?;
                reply(state.users.set_active(id, dto.is_active).await?)
            }
            Operation::UserFindByRole => {
                let name: String = arg(data, "name")?;
                reply(state.users.users_by_role(&name).await?)
            }

            // ==================== 역할 ====================
            Operation::RoleCreate => {
                let dto: CreateRoleDto = arg(data, "createRoleDto")?;
                reply(state.roles.create(dto).await?)
            }
            Operation::RoleFindAll => reply(state.roles.find_all().await?),
            Operation::RoleFindById => reply(state.roles.find_by_id(arg(data, "id")?).await?),
            Operation::RoleFindByName => {
                let name: String = arg(data, "name")?;
                reply(state.roles.find_by_name(&name).await?)
            }
            Operation::RoleUpdate => {
                let (id, dto) = targeted::<UpdateRoleDto>(data, "updateRoleDto")?;
                reply(state.roles.update(id, dto).await?)
            }
            Operation::RoleDelete => {
                state.roles.delete(arg(data, "id")?).await?;
                reply(MessageResponse::new("Role deleted successfully"))
            }
            Operation::RoleAddPermissions => {
                let (id, dto) = targeted::<PermissionsDto>(data, "permissionsDto")?;
                reply(state.roles.add_permissions(id, dto).await?)
            }
            Operation::RoleRemovePermissions => {
                let (id, dto) = targeted::<PermissionsDto>(data, "permissionsDto")?;
                reply(state.roles.remove_permissions(id, dto).await?)
            }
            Operation::RoleSetPermissions => {
                let (id, dto) = targeted::<PermissionsDto>(data, "permissionsDto")?;
                reply(state.roles.set_permissions(id, dto.permissions).await?)
            }
            Operation::RoleUsers => reply(state.roles.users_with_role(arg(data, "id")?).await?),
            Operation::RoleAllPermissions => reply(state.roles.all_permissions().await?),
            Operation::RoleFindByPermission => {
                let permission: String = arg(data, "permission")?;
                reply(state.roles.roles_by_permission(&permission).await?)
            }

            // ==================== 주문 ====================
            Operation::OrderCreate => {
                let dto: CreateOrderDto = arg(data, "createOrderDto")?;
                reply(state.orders.create(dto).await?)
            }
            Operation::OrderFindAll => reply(state.orders.find_all().await?),
            Operation::OrderFindOne => reply(state.orders.find_one(arg(data, "id")?).await?),
            Operation::OrderUpdateStatus => {
                let (id, dto) = targeted::<UpdateOrderStatusDto>(data, "updateOrderStatusDto")?;
                reply(state.orders.update_status(id, dto.status).await?)
            }
            Operation::OrderUpdatePayment => {
                let (id, dto) =
                    targeted::<UpdatePaymentStatusDto>(data, "updatePaymentStatusDto")?;
                reply(
                    state
                        .orders
                        .update_payment_status(id, dto.payment_status)
                        .await?,
                )
            }
            Operation::OrderRemove => {
                state.orders.remove(arg(data, "id")?).await?;
                reply(MessageResponse::new("Order deleted successfully"))
            }

            // ==================== 헬스 체크 ====================
            Operation::HealthCheck | Operation::HealthDetailed => reply(health_report(state).await),
            Operation::HealthRedis => reply(cache_status(state).await),
            Operation::HealthLiveness => reply(LivenessResponse::ok()),
            Operation::HealthReadiness => {
                let report = health_report(state).await;
                if !report.is_ready() {
                    return Err(ServiceError::Unavailable(
                        "데이터베이스에 연결할 수 없습니다".to_string(),
                    ));
                }
                reply(report)
            }
        }
    }
}

impl std::fmt::Debug for RpcDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcDispatcher")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

// ==================== 입력/출력 변환 ====================

fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    token.strip_prefix("Bearer ").unwrap_or(token).trim()
}

fn missing_token() -> ServiceError {
    ServiceError::Unauthenticated("인증 토큰이 필요합니다".to_string())
}

fn require(claims: Option<Claims>) -> ServiceResult<Claims> {
    claims.ok_or_else(missing_token)
}

fn reply<T: Serialize>(value: T) -> ServiceResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn parse<T: DeserializeOwned>(data: Value) -> ServiceResult<T> {
    serde_json::from_value(data)
        .map_err(|e| ServiceError::InvalidInput(format!("잘못된 입력 형식: {}", e)))
}

/// `data` 자체 또는 `data[field]`를 해석합니다.
fn arg<T: DeserializeOwned>(data: Value, field: &str) -> ServiceResult<T> {
    match data {
        Value::Object(mut map) if map.contains_key(field) => {
            parse(map.remove(field).unwrap_or(Value::Null))
        }
        other => parse(other),
    }
}

/// `{id, <field>: {...}}` 또는 `{id, ...본문}`.
fn targeted<T: DeserializeOwned>(data: Value, field: &str) -> ServiceResult<(Uuid, T)> {
    let Value::Object(mut map) = data else {
        return Err(ServiceError::InvalidInput(
            "id와 입력 객체가 필요합니다".to_string(),
        ));
    };

    let id: Uuid = parse(map.remove("id").unwrap_or(Value::Null))?;
    let body = match map.remove(field) {
        Some(body) => body,
        None => Value::Object(map),
    };
    Ok((id, parse(body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("  abc "), "abc");
    }

    #[test]
    fn test_arg_accepts_bare_and_wrapped() {
        let id = Uuid::new_v4();

        let bare: Uuid = arg(json!(id.to_string()), "id").unwrap();
        let wrapped: Uuid = arg(json!({ "id": id.to_string() }), "id").unwrap();

        assert_eq!(bare, id);
        assert_eq!(wrapped, id);
    }

    #[test]
    fn test_arg_rejects_bad_uuid() {
        let result: ServiceResult<Uuid> = arg(json!("not-a-uuid"), "id");
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn test_targeted_nested_and_flat() {
        let id = Uuid::new_v4();

        let (nested_id, nested): (Uuid, SetStatusDto) = targeted(
            json!({ "id": id.to_string(), "setStatusDto": { "isActive": false } }),
            "setStatusDto",
        )
        .unwrap();
        assert_eq!(nested_id, id);
        assert!(!nested.is_active);

        let (_, flat): (Uuid, PermissionsDto) = targeted(
            json!({ "id": id.to_string(), "permissions": ["order:read"] }),
            "permissionsDto",
        )
        .unwrap();
        assert_eq!(flat.permissions, vec!["order:read".to_string()]);
    }

    #[test]
    fn test_targeted_requires_object() {
        let result: ServiceResult<(Uuid, SetStatusDto)> = targeted(json!("x"), "setStatusDto");
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }
}
