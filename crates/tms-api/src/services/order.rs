//! 운송 주문 서비스.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use std::sync::Arc;
use tms_cache::{keys, Cache};
use tms_core::{Address, Order, OrderStatus, PaymentStatus, ServiceError, ServiceResult};
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::validate;
use crate::repository::{NewOrder, OrderStore};

// ==================== DTO ====================

/// 주소 입력.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressDto {
    #[validate(length(min = 1, message = "street는 필수입니다"))]
    pub street: String,
    #[validate(length(min = 1, message = "city는 필수입니다"))]
    pub city: String,
    #[validate(length(min = 1, message = "state는 필수입니다"))]
    pub state: String,
    #[validate(length(min = 1, message = "zipCode는 필수입니다"))]
    pub zip_code: String,
    #[validate(length(min = 1, message = "country는 필수입니다"))]
    pub country: String,
    #[validate(range(min = -90.0, max = 90.0, message = "latitude 범위를 벗어났습니다"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "longitude 범위를 벗어났습니다"))]
    pub longitude: Option<f64>,
}

impl From<AddressDto> for Address {
    fn from(dto: AddressDto) -> Self {
        Address {
            street: dto.street,
            city: dto.city,
            state: dto.state,
            zip_code: dto.zip_code,
            country: dto.country,
            latitude: dto.latitude,
            longitude: dto.longitude,
        }
    }
}

/// 주문 생성 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderDto {
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    #[validate(nested)]
    pub pickup_address: AddressDto,
    #[validate(nested)]
    pub delivery_address: AddressDto,
    /// 총 금액 (기본 0, 음수 불가)
    #[validate(custom(function = "non_negative"))]
    #[schema(value_type = Option<String>, example = "125.50")]
    pub total_amount: Option<Decimal>,
}

/// 배송 상태 변경 요청.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusDto {
    pub status: OrderStatus,
}

/// 결제 상태 변경 요청.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusDto {
    pub payment_status: PaymentStatus,
}

fn non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("totalAmount는 0 이상이어야 합니다".into());
        return Err(err);
    }
    Ok(())
}

// ==================== 서비스 ====================

/// 주문 CRUD 및 상태 전이.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    cache: Cache,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>, cache: Cache) -> Self {
        Self { orders, cache }
    }

    pub async fn create(&self, dto: CreateOrderDto) -> ServiceResult<Order> {
        validate(&dto)?;

        let total_amount = dto
            .total_amount
            .unwrap_or(Decimal::ZERO)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        let order = self
            .orders
            .insert(NewOrder {
                customer_id: dto.customer_id,
                driver_id: dto.driver_id,
                vehicle_id: dto.vehicle_id,
                pickup_address: dto.pickup_address.into(),
                delivery_address: dto.delivery_address.into(),
                total_amount,
            })
            .await?;

        self.invalidate().await;
        info!(order_id = %order.id, customer_id = %order.customer_id, "Order created");
        Ok(order)
    }

    pub async fn find_all(&self) -> ServiceResult<Vec<Order>> {
        self.cache
            .get_or_load(&keys::orders_all(), Some(keys::ENTITY_TTL), || self.orders.list())
            .await
    }

    pub async fn find_one(&self, id: Uuid) -> ServiceResult<Order> {
        self.cache
            .get_or_load(&keys::order(id), Some(keys::ENTITY_TTL), || self.load(id))
            .await
    }

    /// 배송 상태 전이. 같은 상태면 변경 없이 현재 주문을 반환합니다.
    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> ServiceResult<Order> {
        let current = self.load(id).await?;

        if current.status == status {
            debug!(order_id = %id, %status, "Order status unchanged");
            return Ok(current);
        }
        if !current.status.can_transition_to(status) {
            return Err(ServiceError::Conflict(format!(
                "주문 상태를 {}에서 {}(으)로 변경할 수 없습니다",
                current.status, status
            )));
        }

        let updated = self
            .orders
            .update_status(id, status)
            .await?
            .ok_or_else(|| ServiceError::not_found("주문", id))?;

        self.invalidate().await;
        info!(order_id = %id, from = %current.status, to = %status, "Order status changed");
        Ok(updated)
    }

    /// 결제 상태 전이. 같은 상태면 변경 없이 현재 주문을 반환합니다.
    pub async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> ServiceResult<Order> {
        let current = self.load(id).await?;

        if current.payment_status == status {
            debug!(order_id = %id, %status, "Payment status unchanged");
            return Ok(current);
        }
        if !current.payment_status.can_transition_to(status) {
            return Err(ServiceError::Conflict(format!(
                "결제 상태를 {}에서 {}(으)로 변경할 수 없습니다",
                current.payment_status, status
            )));
        }

        let updated = self
            .orders
            .update_payment_status(id, status)
            .await?
            .ok_or_else(|| ServiceError::not_found("주문", id))?;

        self.invalidate().await;
        info!(order_id = %id, from = %current.payment_status, to = %status, "Payment status changed");
        Ok(updated)
    }

    pub async fn remove(&self, id: Uuid) -> ServiceResult<()> {
        if !self.orders.delete(id).await? {
            return Err(ServiceError::not_found("주문", id));
        }

        self.invalidate().await;
        info!(order_id = %id, "Order removed");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ServiceResult<Order> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("주문", id))
    }

    async fn invalidate(&self) {
        self.cache.invalidate_prefix(keys::ORDERS_PREFIX).await;
    }
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn address(city: &str) -> AddressDto {
        AddressDto {
            street: "12 Teheran-ro".to_string(),
            city: city.to_string(),
            state: "Seoul".to_string(),
            zip_code: "06234".to_string(),
            country: "KR".to_string(),
            latitude: Some(37.5006),
            longitude: None,
        }
    }

    fn create_dto(total: Option<Decimal>) -> CreateOrderDto {
        CreateOrderDto {
            customer_id: Uuid::new_v4(),
            driver_id: None,
            vehicle_id: None,
            pickup_address: address("Seoul"),
            delivery_address: address("Busan"),
            total_amount: total,
        }
    }

    fn service() -> OrderService {
        OrderService::new(
            Arc::new(MemoryStore::new()),
            Cache::in_memory(Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn test_create_and_fetch_keeps_address() {
        let svc = service();
        let created = svc.create(create_dto(Some(dec!(99.999)))).await.unwrap();

        assert_eq!(created.total_amount, dec!(100.00));
        let fetched = svc.find_one(created.id).await.unwrap();
        assert_eq!(fetched.pickup_address, created.pickup_address);
        assert_eq!(fetched.pickup_address.latitude, Some(37.5006));
        assert_eq!(fetched.pickup_address.longitude, None);
        assert_eq!(fetched.delivery_address.city, "Busan");
    }

    #[tokio::test]
    async fn test_create_rejects_blank_address_and_negative_total() {
        let svc = service();

        let mut dto = create_dto(None);
        dto.pickup_address.street = String::new();
        assert!(matches!(svc.create(dto).await, Err(ServiceError::InvalidInput(_))));

        let result = svc.create(create_dto(Some(dec!(-1)))).await;
        let Err(ServiceError::InvalidInput(message)) = result else {
            panic!("expected InvalidInput");
        };
        assert!(message.contains("totalAmount"));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let svc = service();
        let order = svc.create(create_dto(None)).await.unwrap();

        let unchanged = svc.update_status(order.id, OrderStatus::Pending).await.unwrap();
        assert_eq!(unchanged.status, OrderStatus::Pending);

        let err = svc
            .update_status(order.id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let assigned = svc.update_status(order.id, OrderStatus::Assigned).await.unwrap();
        assert_eq!(assigned.status, OrderStatus::Assigned);
        assert_eq!(svc.find_one(order.id).await.unwrap().status, OrderStatus::Assigned);
    }

    #[tokio::test]
    async fn test_paid_is_final() {
        let svc = service();
        let order = svc.create(create_dto(None)).await.unwrap();

        svc.update_payment_status(order.id, PaymentStatus::Paid)
            .await
            .unwrap();
        let err = svc
            .update_payment_status(order.id, PaymentStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_remove_invalidates_list() {
        let svc = service();
        let order = svc.create(create_dto(None)).await.unwrap();
        assert_eq!(svc.find_all().await.unwrap().len(), 1);

        svc.remove(order.id).await.unwrap();
        assert!(svc.find_all().await.unwrap().is_empty());
        assert!(matches!(
            svc.remove(order.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
