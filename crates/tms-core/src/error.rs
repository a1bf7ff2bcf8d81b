//! 서비스 계층 에러 타입.
//!
//! 도메인 서비스, 토큰 서비스, 권한 가드가 반환하는 에러 분류입니다.
//! 저장소/드라이버 에러는 이 타입으로 변환된 뒤에만 코어 경계를 넘습니다.
//! HTTP/RPC 어댑터는 [`ServiceError::code`]를 기준으로 응답을 구성합니다.

use thiserror::Error;

/// 코어 서비스 에러.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// 엔티티를 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 고유성 제약 위반 (이메일, 역할 이름)
    #[error("이미 존재함: {0}")]
    AlreadyExists(String),

    /// 로그인/비밀번호 불일치
    #[error("잘못된 자격 증명입니다")]
    InvalidCredentials,

    /// 토큰 누락, 만료, 위조, 폐기
    #[error("인증 실패: {0}")]
    Unauthenticated(String),

    /// 역할이 허용 목록에 없음
    #[error("권한 없음: {0}")]
    Forbidden(String),

    /// 삭제/상태 전이 가드 위반
    #[error("충돌: {0}")]
    Conflict(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 저장소/캐시/백엔드 타임아웃 또는 연결 실패
    #[error("서비스를 사용할 수 없음: {0}")]
    Unavailable(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 서비스 작업을 위한 Result 타입.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// 엔티티 종류와 식별자로 NotFound 에러를 생성합니다.
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} '{}'", entity, id))
    }

    /// 전송 계층에서 사용하는 안정적인 에러 코드.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::AlreadyExists(_) => "ALREADY_EXISTS",
            ServiceError::InvalidCredentials => "INVALID_CREDENTIALS",
            ServiceError::Unauthenticated(_) => "UNAUTHENTICATED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::Unavailable(_) => "UNAVAILABLE",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(format!("직렬화 실패: {}", err))
    }
}
