//! 권한 집계 속성 테스트.
//!
//! 역할 순서, 중복 보유, 권한 태그 중복과 무관하게
//! 유효 권한 집합이 같은지 검증합니다.

use chrono::Utc;
use proptest::prelude::*;
use tms_core::{aggregate_permissions, normalize_permissions, OrderStatus, Role};
use uuid::Uuid;

fn role_with(permissions: Vec<String>) -> Role {
    let now = Utc::now();
    Role {
        id: Uuid::new_v4(),
        name: "generated".to_string(),
        description: None,
        permissions: normalize_permissions(permissions),
        created_at: now,
        updated_at: now,
    }
}

fn permission_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "user:read",
        "user:create",
        "user:update",
        "role:read",
        "order:read",
        "order:create",
        "order:update",
        "order:delete",
    ])
    .prop_map(str::to_string)
}

fn roles_strategy() -> impl Strategy<Value = Vec<Role>> {
    prop::collection::vec(
        prop::collection::vec(permission_strategy(), 0..6).prop_map(role_with),
        0..5,
    )
}

proptest! {
    #[test]
    fn test_aggregation_ignores_role_order(roles in roles_strategy()) {
        let forward = aggregate_permissions(&roles);
        let reversed: Vec<Role> = roles.iter().rev().cloned().collect();

        prop_assert_eq!(forward, aggregate_permissions(&reversed));
    }

    #[test]
    fn test_aggregation_is_idempotent(roles in roles_strategy()) {
        let once = aggregate_permissions(&roles);
        let doubled: Vec<Role> = roles.iter().chain(roles.iter()).cloned().collect();

        prop_assert_eq!(&once, &aggregate_permissions(&doubled));
        prop_assert_eq!(once.clone(), normalize_permissions(&once));
    }

    #[test]
    fn test_aggregation_covers_every_role(roles in roles_strategy()) {
        let all = aggregate_permissions(&roles);
        for role in &roles {
            for permission in &role.permissions {
                prop_assert!(all.contains(permission));
            }
        }
    }
}

#[test]
fn test_no_path_leaves_terminal_order_state() {
    let all = [
        OrderStatus::Pending,
        OrderStatus::Assigned,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    // pending에서 도달 가능한 모든 상태 탐색
    let mut reachable = vec![OrderStatus::Pending];
    let mut i = 0;
    while i < reachable.len() {
        let from = reachable[i];
        for to in all {
            if from.can_transition_to(to) && !reachable.contains(&to) {
                reachable.push(to);
            }
        }
        i += 1;
    }

    assert_eq!(reachable.len(), all.len());
    assert!(reachable
        .iter()
        .filter(|s| s.is_terminal())
        .all(|s| all.iter().all(|to| !s.can_transition_to(*to))));
}
