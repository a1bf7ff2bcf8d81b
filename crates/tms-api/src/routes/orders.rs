//! 운송 주문 endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use std::sync::Arc;
use tms_core::Order;
use uuid::Uuid;

use crate::auth::{JwtAuth, Operation};
use crate::error::{ApiErrorResponse, ApiJson, ApiPath, ApiResult};
use crate::services::{CreateOrderDto, UpdateOrderStatusDto, UpdatePaymentStatusDto};
use crate::state::AppState;

/// 주문 생성.
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderDto,
    responses(
        (status = 201, description = "생성됨", body = Order),
        (status = 400, description = "입력 오류", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiJson(dto): ApiJson<CreateOrderDto>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    auth.authorize(&state.policy, Operation::OrderCreate)?;
    let order = state.orders.create(dto).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// 전체 주문 목록 (최신순).
#[utoipa::path(
    get,
    path = "/api/orders",
    responses((status = 200, description = "주문 목록", body = Vec<Order>)),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
) -> ApiResult<Json<Vec<Order>>> {
    auth.authorize(&state.policy, Operation::OrderFindAll)?;
    Ok(Json(state.orders.find_all().await?))
}

/// 주문 조회.
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "주문 ID")),
    responses(
        (status = 200, description = "주문", body = Order),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Order>> {
    auth.authorize(&state.policy, Operation::OrderFindOne)?;
    Ok(Json(state.orders.find_one(id).await?))
}

/// 배송 상태 변경.
#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "주문 ID")),
    request_body = UpdateOrderStatusDto,
    responses(
        (status = 200, description = "변경됨", body = Order),
        (status = 409, description = "허용되지 않는 전이", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<UpdateOrderStatusDto>,
) -> ApiResult<Json<Order>> {
    auth.authorize(&state.policy, Operation::OrderUpdateStatus)?;
    Ok(Json(state.orders.update_status(id, dto.status).await?))
}

/// 결제 상태 변경.
#[utoipa::path(
    patch,
    path = "/api/orders/{id}/payment",
    params(("id" = Uuid, Path, description = "주문 ID")),
    request_body = UpdatePaymentStatusDto,
    responses(
        (status = 200, description = "변경됨", body = Order),
        (status = 409, description = "허용되지 않는 전이", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_payment_status(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(dto): ApiJson<UpdatePaymentStatusDto>,
) -> ApiResult<Json<Order>> {
    auth.authorize(&state.policy, Operation::OrderUpdatePayment)?;
    Ok(Json(
        state
            .orders
            .update_payment_status(id, dto.payment_status)
            .await?,
    ))
}

/// 주문 삭제.
#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "주문 ID")),
    responses(
        (status = 204, description = "삭제됨"),
        (status = 404, description = "없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    auth: JwtAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    auth.authorize(&state.policy, Operation::OrderRemove)?;
    state.orders.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 주문 라우터 생성.
pub fn orders_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order).delete(delete_order))
        .route("/{id}/status", patch(update_order_status))
        .route("/{id}/payment", patch(update_payment_status))
}
