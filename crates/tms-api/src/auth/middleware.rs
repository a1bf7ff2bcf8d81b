//! Axum용 JWT 인증 추출기.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tms_core::ServiceError;

use super::{AccessPolicy, Claims, Operation};
use crate::error::ApiError;
use crate::state::AppState;

/// 인증된 호출자.
///
/// `Authorization: Bearer <token>` 헤더의 Access Token을 [`TokenService`]로
/// 검증합니다. 폐기(로그아웃)를 위해 원본 토큰도 함께 보관합니다.
///
/// [`TokenService`]: super::TokenService
#[derive(Debug, Clone)]
pub struct JwtAuth {
    pub claims: Claims,
    pub token: String,
}

impl JwtAuth {
    /// 작업 허용 목록 검사.
    pub fn authorize(&self, policy: &AccessPolicy, operation: Operation) -> Result<(), ApiError> {
        policy
            .authorize(Some(&self.claims), operation)
            .map_err(ApiError::from)
    }
}

/// 헤더에서 Bearer 토큰을 추출합니다.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ServiceError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthenticated("인증 토큰이 필요합니다".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ServiceError::Unauthenticated("잘못된 Authorization 헤더 형식".to_string())
        })?;

    Ok(token)
}

impl FromRequestParts<Arc<AppState>> for JwtAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.to_string();
        let claims = state.tokens.verify_access(&token).await?;
        Ok(JwtAuth { claims, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(ServiceError::Unauthenticated(_))
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }
}
