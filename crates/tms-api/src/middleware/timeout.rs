//! 요청 처리 시간 제한.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tms_core::ServiceError;
use tracing::warn;

use crate::error::ApiError;

/// `limit` 안에 끝나지 않은 요청을 `UNAVAILABLE`(503)로 끝냅니다.
///
/// 응답 본문은 다른 에러와 같은 형식이며 `details.retryable = true`를 포함합니다.
pub async fn request_timeout(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%method, %path, timeout_ms = limit.as_millis() as u64, "HTTP request timed out");
            ApiError::from(ServiceError::Unavailable(format!(
                "{}ms 안에 응답하지 못했습니다",
                limit.as_millis()
            )))
            .into_response()
        }
    }
}
