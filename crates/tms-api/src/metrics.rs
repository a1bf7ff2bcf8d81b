//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP/RPC 요청 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.
//! 캐시(`tms_cache_*`)와 토큰(`tms_auth_*`) 메트릭은 각 모듈에서 직접 기록합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("rpc_call_duration_seconds".to_string()),
            DURATION_BUCKETS,
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭 헬퍼 함수
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// RPC 메트릭 헬퍼 함수
// ============================================================================

/// RPC 호출 결과 기록.
///
/// `outcome`은 성공 시 `"ok"`, 실패 시 에러 코드입니다.
pub fn record_rpc_call(pattern: &str, outcome: &str, duration_secs: f64) {
    counter!(
        "rpc_calls_total",
        "pattern" => pattern.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("rpc_call_duration_seconds", "pattern" => pattern.to_string())
        .record(duration_secs);
}

// ============================================================================
// 경로 정규화 유틸리티
// ============================================================================

/// 경로에서 동적 파라미터를 정규화합니다.
///
/// 예: `/api/orders/123e4567-e89b-12d3-a456-426614174000` → `/api/orders/:id`
///
/// 이메일/역할 이름/권한처럼 자유 형식 값이 오는 세그먼트도 라벨 폭증을 막기 위해
/// 직전 세그먼트를 보고 `:value`로 바꿉니다.
pub fn normalize_path(path: &str) -> String {
    let mut previous = "";
    let normalized: Vec<String> = path
        .split('/')
        .map(|segment| {
            let is_uuid = segment.len() == 36 && segment.chars().filter(|c| *c == '-').count() == 4;
            let is_numeric = !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit());
            let is_free_form = matches!(previous, "email" | "role" | "name" | "permission");
            previous = segment;

            if is_uuid || is_numeric {
                ":id".to_string()
            } else if is_free_form && !segment.is_empty() {
                ":value".to_string()
            } else {
                segment.to_string()
            }
        })
        .collect();
    normalized.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/orders/123e4567-e89b-12d3-a456-426614174000";
        assert_eq!(normalize_path(path), "/api/orders/:id");
    }

    #[test]
    fn test_normalize_path_no_params() {
        assert_eq!(normalize_path("/api/roles"), "/api/roles");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
    }

    #[test]
    fn test_normalize_path_free_form_segments() {
        assert_eq!(
            normalize_path("/api/users/email/kim@example.com"),
            "/api/users/email/:value"
        );
        assert_eq!(normalize_path("/api/roles/name/driver"), "/api/roles/name/:value");
        assert_eq!(
            normalize_path("/api/roles/123e4567-e89b-12d3-a456-426614174000/permissions"),
            "/api/roles/:id/permissions"
        );
    }
}
