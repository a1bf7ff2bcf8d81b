//! JWT 토큰 처리.
//!
//! Access Token 및 Refresh Token 생성/검증 로직. 두 토큰 모두 같은 비밀 키로
//! HS256 서명되며 `token_type` 클레임으로 구분됩니다.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tms_core::User;
use uuid::Uuid;

/// 토큰 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT 페이로드.
///
/// 사용자 식별 정보와 발급 시점의 역할/권한 스냅샷을 포함합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 ID
    pub sub: Uuid,
    pub email: String,
    /// 역할 이름
    pub roles: Vec<String>,
    /// 역할 권한의 합집합
    pub permissions: Vec<String>,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID - 토큰 고유 식별자
    pub jti: String,
    pub token_type: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    /// 사용자로부터 Claims 생성.
    pub fn for_user(user: &User, kind: TokenKind, ttl: Duration, issuer: Option<&str>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id,
            email: user.email.clone(),
            roles: user.role_names(),
            permissions: user.permissions(),
            iat: now,
            exp: now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
            jti: Uuid::new_v4().to_string(),
            token_type: kind,
            iss: issuer.map(str::to_string),
        }
    }

    /// 토큰이 만료되었는지 확인.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// 남은 수명. 만료되었으면 0.
    pub fn remaining(&self) -> Duration {
        let left = self.exp - Utc::now().timestamp();
        Duration::from_secs(u64::try_from(left).unwrap_or(0))
    }

    /// 특정 역할을 가지는지 확인 (대소문자 무시).
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// JWT 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("토큰 인코딩 실패: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),
    #[error("토큰 디코딩 실패")]
    DecodingError,
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
    #[error("잘못된 토큰 형식")]
    InvalidToken,
    #[error("잘못된 토큰 서명")]
    InvalidSignature,
    #[error("토큰 종류가 올바르지 않습니다")]
    WrongKind,
}

/// 토큰 서명.
pub fn create_token(claims: &Claims, secret: &[u8]) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(JwtError::from)
}

/// 토큰 디코딩 및 검증.
///
/// 서명, 만료 시각, 토큰 종류를 확인합니다. `issuer`가 주어지면 `iss`도 확인합니다.
pub fn decode_token(
    token: &str,
    secret: &[u8],
    expected: TokenKind,
    issuer: Option<&str>,
) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation).map_err(
        |e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                JwtError::InvalidToken
            }
            _ => JwtError::DecodingError,
        },
    )?;

    if data.claims.token_type != expected {
        return Err(JwtError::WrongKind);
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::Role;

    const TEST_SECRET: &[u8] = b"test-secret-key-for-jwt-testing-minimum-32-chars";

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "driver@example.com".to_string(),
            first_name: "Hyun".to_string(),
            last_name: "Cho".to_string(),
            is_active: true,
            roles: vec![Role {
                id: Uuid::new_v4(),
                name: "driver".to_string(),
                description: None,
                permissions: vec!["order:read".to_string(), "order:update".to_string()],
                created_at: now,
                updated_at: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_create_and_decode_token() {
        let user = user();
        let claims = Claims::for_user(&user, TokenKind::Access, Duration::from_secs(60), None);

        let token = create_token(&claims, TEST_SECRET).unwrap();
        let decoded = decode_token(&token, TEST_SECRET, TokenKind::Access, None).unwrap();

        assert_eq!(decoded, claims);
        assert_eq!(decoded.sub, user.id);
        assert_eq!(decoded.roles, vec!["driver"]);
        assert_eq!(decoded.permissions, vec!["order:read", "order:update"]);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let claims = Claims::for_user(&user(), TokenKind::Refresh, Duration::from_secs(60), None);
        let token = create_token(&claims, TEST_SECRET).unwrap();

        let result = decode_token(&token, TEST_SECRET, TokenKind::Access, None);
        assert!(matches!(result, Err(JwtError::WrongKind)));
    }

    #[test]
    fn test_expired_token() {
        let mut claims = Claims::for_user(&user(), TokenKind::Access, Duration::from_secs(60), None);
        claims.exp = Utc::now().timestamp() - 10;
        let token = create_token(&claims, TEST_SECRET).unwrap();

        let result = decode_token(&token, TEST_SECRET, TokenKind::Access, None);
        assert!(matches!(result, Err(JwtError::TokenExpired)));
        assert!(claims.is_expired());
        assert_eq!(claims.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_wrong_secret() {
        let claims = Claims::for_user(&user(), TokenKind::Access, Duration::from_secs(60), None);
        let token = create_token(&claims, TEST_SECRET).unwrap();

        let result = decode_token(
            &token,
            b"wrong-secret-key-for-testing-minimum-32-chars",
            TokenKind::Access,
            None,
        );
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_issuer_is_checked() {
        let claims = Claims::for_user(
            &user(),
            TokenKind::Access,
            Duration::from_secs(60),
            Some("tms-middleware"),
        );
        let token = create_token(&claims, TEST_SECRET).unwrap();

        assert!(decode_token(&token, TEST_SECRET, TokenKind::Access, Some("tms-middleware")).is_ok());
        assert!(decode_token(&token, TEST_SECRET, TokenKind::Access, Some("other")).is_err());
    }

    #[test]
    fn test_invalid_token() {
        let result = decode_token("invalid.token.here", TEST_SECRET, TokenKind::Access, None);
        assert!(result.is_err());
    }
}
