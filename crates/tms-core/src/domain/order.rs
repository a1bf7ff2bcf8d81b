//! 운송 주문 타입.
//!
//! 이 모듈은 주문 관련 타입을 정의합니다:
//! - `OrderStatus` - 배송 상태 (pending → assigned → in_transit → delivered, 또는 cancelled)
//! - `PaymentStatus` - 결제 상태 (pending → paid/failed)
//! - `Address` - 픽업/배송 주소
//! - `Order` - 주문 엔티티

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 주문 배송 상태.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx-support",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// 접수됨 (배차 전)
    #[default]
    Pending,
    /// 기사 배정됨
    Assigned,
    /// 운송 중
    InTransit,
    /// 배송 완료
    Delivered,
    /// 취소됨
    Cancelled,
}

impl OrderStatus {
    /// 최종 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// `next`로 전이할 수 있는지 확인합니다.
    ///
    /// 같은 상태로의 전이는 허용 전이로 보지 않습니다.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Pending, Cancelled)
                | (Assigned, InTransit)
                | (Assigned, Cancelled)
                | (InTransit, Delivered)
                | (InTransit, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 결제 상태.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx-support",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// 결제 대기
    #[default]
    Pending,
    /// 결제 완료
    Paid,
    /// 결제 실패
    Failed,
}

impl PaymentStatus {
    /// `next`로 전이할 수 있는지 확인합니다.
    ///
    /// 실패한 결제는 재시도(pending) 또는 완료(paid)로 전이할 수 있고,
    /// 완료된 결제는 더 이상 바뀌지 않습니다.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Pending, Failed) | (Failed, Paid) | (Failed, Pending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 픽업/배송 주소.
///
/// 위도/경도는 선택이며, 없으면 직렬화 결과에도 나타나지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// 운송 주문 엔티티.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// 주문 ID
    pub id: Uuid,
    /// 고객 사용자 ID
    pub customer_id: Uuid,
    /// 배정 기사 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<Uuid>,
    /// 배정 차량 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<Uuid>,
    pub pickup_address: Address,
    pub delivery_address: Address,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// 총 금액 (소수점 2자리)
    #[cfg_attr(feature = "utoipa-support", schema(value_type = String, example = "125.50"))]
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_transitions() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Assigned));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Assigned.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delivered));

        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Assigned.can_transition_to(Assigned));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        let all = [
            OrderStatus::Pending,
            OrderStatus::Assigned,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn test_payment_status_transitions() {
        use PaymentStatus::*;

        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Failed));
        assert!(!Paid.can_transition_to(Pending));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::InTransit).unwrap(),
            "\"in_transit\""
        );
        let parsed: PaymentStatus = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Paid);
        assert_eq!(OrderStatus::InTransit.to_string(), "in_transit");
    }

    #[test]
    fn test_address_optional_coordinates() {
        let without = Address {
            street: "12 Teheran-ro".to_string(),
            city: "Seoul".to_string(),
            state: "Seoul".to_string(),
            zip_code: "06234".to_string(),
            country: "KR".to_string(),
            latitude: None,
            longitude: None,
        };
        let json = serde_json::to_value(&without).unwrap();
        assert!(json.get("latitude").is_none());
        assert_eq!(json["zipCode"], "06234");

        let with = Address {
            latitude: Some(37.5006),
            longitude: Some(127.0364),
            ..without
        };
        let back: Address = serde_json::from_str(&serde_json::to_string(&with).unwrap()).unwrap();
        assert_eq!(back, with);
    }
}
