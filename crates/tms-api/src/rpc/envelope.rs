//! RPC 요청/응답 봉투.
//!
//! 프레임 하나가 JSON 객체 하나입니다 (줄바꿈 구분).
//!
//! ```json
//! {"id": 7, "pattern": "order.findOne", "token": "eyJ...", "data": {"id": "..."}}
//! {"id": 7, "success": true, "data": {...}}
//! {"id": 7, "success": false, "error": {"code": "NOT_FOUND", "message": "..."}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tms_core::ServiceError;

/// 요청 봉투.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// 호출자가 정한 상관 ID (문자열 또는 숫자). 응답에 그대로 돌려줍니다.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// 작업 이름 (`user.findById` 형식)
    pub pattern: String,

    /// Access Token (`Bearer ` 접두사 허용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// 작업 입력
    #[serde(default)]
    pub data: Value,
}

impl RpcRequest {
    pub fn new(pattern: impl Into<String>, data: Value) -> Self {
        Self {
            id: None,
            pattern: pattern.into(),
            token: None,
            data,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// 에러 본문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// 에러 코드 (HTTP 응답과 같은 코드)
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&ServiceError> for RpcError {
    fn from(error: &ServiceError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            details: error
                .is_retryable()
                .then(|| serde_json::json!({ "retryable": true })),
        }
    }
}

/// 응답 봉투.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: Option<Value>, data: Value) -> Self {
        Self {
            id,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, error: &ServiceError) -> Self {
        Self {
            id,
            success: false,
            data: None,
            error: Some(RpcError::from(error)),
        }
    }

    /// 에러 코드 (성공이면 `None`).
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}
