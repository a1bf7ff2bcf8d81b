//! 주문 저장소 (PostgreSQL).
//!
//! 주소는 JSONB 컬럼에 저장됩니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::FromRow;
use tms_core::{Address, Order, OrderStatus, PaymentStatus, ServiceResult};
use tracing::debug;
use uuid::Uuid;

use super::{db_err, PgStore};
use crate::repository::{NewOrder, OrderStore};

#[derive(Debug, Clone, FromRow)]
struct OrderRecord {
    id: Uuid,
    customer_id: Uuid,
    driver_id: Option<Uuid>,
    vehicle_id: Option<Uuid>,
    pickup_address: Json<Address>,
    delivery_address: Json<Address>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRecord> for Order {
    fn from(r: OrderRecord) -> Self {
        Order {
            id: r.id,
            customer_id: r.customer_id,
            driver_id: r.driver_id,
            vehicle_id: r.vehicle_id,
            pickup_address: r.pickup_address.0,
            delivery_address: r.delivery_address.0,
            status: r.status,
            payment_status: r.payment_status,
            total_amount: r.total_amount,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str = r#"id, customer_id, driver_id, vehicle_id, pickup_address,
    delivery_address, status, payment_status, total_amount, created_at, updated_at"#;

#[async_trait]
impl OrderStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Order>> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("주문 조회", e))?;

        Ok(record.map(Order::from))
    }

    async fn list(&self) -> ServiceResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("주문 목록 조회", e))?;

        Ok(records.into_iter().map(Order::from).collect())
    }

    async fn insert(&self, order: NewOrder) -> ServiceResult<Order> {
        debug!("주문 생성: customer_id={}", order.customer_id);

        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            r#"
            INSERT INTO orders (
                id, customer_id, driver_id, vehicle_id,
                pickup_address, delivery_address, total_amount
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(order.customer_id)
        .bind(order.driver_id)
        .bind(order.vehicle_id)
        .bind(Json(&order.pickup_address))
        .bind(Json(&order.delivery_address))
        .bind(order.total_amount)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("주문 생성", e))?;

        Ok(record.into())
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> ServiceResult<Option<Order>> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            r#"
            UPDATE orders SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("주문 상태 수정", e))?;

        Ok(record.map(Order::from))
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> ServiceResult<Option<Order>> {
        let record = sqlx::query_as::<_, OrderRecord>(&format!(
            r#"
            UPDATE orders SET payment_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("결제 상태 수정", e))?;

        Ok(record.map(Order::from))
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("주문 삭제", e))?;

        Ok(result.rows_affected() > 0)
    }
}
