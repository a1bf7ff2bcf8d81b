//! HTTP 요청 메트릭 미들웨어.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
};

/// 이 시간을 넘긴 요청은 경고 로그를 남깁니다.
const SLOW_REQUEST: Duration = Duration::from_secs(2);

/// 요청 수, 응답 상태, 처리 시간을 기록합니다.
///
/// Prometheus 수집 요청(`/metrics`) 자체는 기록하지 않습니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    if request.uri().path() == "/metrics" {
        return next.run(request).await;
    }

    let started = Instant::now();
    let method = request.method().as_str().to_owned();
    let path = normalize_path(request.uri().path());
    record_http_request(&method, &path);

    let response = next.run(request).await;

    let elapsed = started.elapsed();
    record_http_response(&method, &path, response.status().as_u16());
    record_http_duration(&method, &path, elapsed.as_secs_f64());
    if elapsed > SLOW_REQUEST {
        warn!(
            %method,
            %path,
            status = response.status().as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Slow HTTP request"
        );
    }

    response
}
