//! 통합 API 에러 응답 타입.
//!
//! 서비스 계층의 [`ServiceError`]를 HTTP 상태 코드와 JSON 본문으로 변환합니다.
//! 모든 엔드포인트는 같은 형식의 에러를 반환합니다.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tms_core::ServiceError;
use utoipa::ToSchema;

/// 통합 API 에러 응답.
///
/// # 예시
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "찾을 수 없음: 사용자 '8c1f...'",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "NOT_FOUND", "FORBIDDEN", "INVALID_INPUT")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    pub timestamp: i64,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// 핸들러 에러.
///
/// 서비스 에러를 감싸며 `IntoResponse`로 상태 코드를 결정합니다.
#[derive(Debug)]
pub struct ApiError {
    error: ServiceError,
    details: Option<Value>,
}

impl ApiError {
    pub fn with_details(error: ServiceError, details: Value) -> Self {
        Self {
            error,
            details: Some(details),
        }
    }

    pub fn inner(&self) -> &ServiceError {
        &self.error
    }
}

/// 서비스 에러에 대응하는 HTTP 상태 코드.
pub fn status_for(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::AlreadyExists(_) | ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::InvalidCredentials | ServiceError::Unauthenticated(_) => {
            StatusCode::UNAUTHORIZED
        }
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self {
            error,
            details: None,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::InvalidInput(rejection.body_text()).into()
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ServiceError::InvalidInput(rejection.body_text()).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::InvalidInput(rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        if status.is_server_error() {
            tracing::error!(code = self.error.code(), error = %self.error, "Request failed");
        }

        let message = self.error.to_string();
        let details = self.details.or_else(|| {
            self.error
                .is_retryable()
                .then(|| serde_json::json!({ "retryable": true }))
        });
        let body = match details {
            Some(details) => ApiErrorResponse::with_details(self.error.code(), message, details),
            None => ApiErrorResponse::new(self.error.code(), message),
        };
        (status, Json(body)).into_response()
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

/// 역직렬화 실패를 [`ApiError`]로 돌려주는 JSON 추출기.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// 경로 파라미터 파싱 실패를 [`ApiError`]로 돌려주는 추출기.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_response_new() {
        let error = ApiErrorResponse::new("NOT_FOUND", "Test message");
        assert_eq!(error.code, "NOT_FOUND");
        assert_eq!(error.message, "Test message");
        assert!(error.timestamp > 0);
        assert!(error.details.is_none());

        let json = serde_json::to_string(&error).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains(r#""code":"NOT_FOUND""#));
    }

    #[test]
    fn test_api_error_response_with_details() {
        let details = serde_json::json!({"missing": ["3f2a"]});
        let error = ApiErrorResponse::with_details("INVALID_INPUT", "Invalid input", details);
        assert_eq!(error.details.unwrap()["missing"][0], "3f2a");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (ServiceError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ServiceError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(status_for(&error), expected, "{:?}", error);
            assert_eq!(ApiError::from(error).into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_unavailable_body_is_retryable() {
        let response = ApiError::from(ServiceError::Unavailable("db".into())).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "UNAVAILABLE");
        assert_eq!(json["details"]["retryable"], true);

        let response = ApiError::from(ServiceError::NotFound("x".into())).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json.get("details").is_none());
    }
}
