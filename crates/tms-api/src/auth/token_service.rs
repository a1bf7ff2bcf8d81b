//! 토큰 서비스.
//!
//! Access/Refresh 토큰을 발급하고 검증합니다. 발급된 Access Token의 클레임은
//! 캐시에 `auth:token:<digest>`로 저장되어 이후 검증의 빠른 경로가 됩니다.
//!
//! # 폐기
//!
//! 로그아웃은 허용 목록 항목을 지우고 `auth:revoked:<digest>`에 남은 수명만큼
//! 거부 항목을 기록합니다. 검증은 거부 목록을 항상 먼저 확인하므로, 캐시 미스 시
//! 서명 검증으로 돌아가더라도 폐기된 토큰은 통과하지 못합니다. 캐시가 내려가 있는
//! 동안에는 거부 목록도 기록/조회할 수 없으므로 폐기는 best-effort가 됩니다.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tms_cache::{keys, Cache};
use tms_core::{JwtConfig, ServiceError, ServiceResult, User};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::jwt::{create_token, decode_token, Claims, JwtError, TokenKind};
use crate::repository::UserStore;

/// Access Token + Refresh Token 쌍.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access Token 수명 (초)
    pub expires_in: u64,
    /// 항상 "Bearer"
    pub token_type: String,
}

/// 토큰 발급/검증 서비스.
pub struct TokenService {
    secret: SecretString,
    access_ttl: Duration,
    refresh_ttl: Duration,
    issuer: Option<String>,
    cache: Cache,
    users: Arc<dyn UserStore>,
}

/// 토큰 캐시 키에 사용하는 SHA-256 지문 (hex).
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

impl TokenService {
    pub fn new(config: &JwtConfig, cache: Cache, users: Arc<dyn UserStore>) -> Self {
        Self {
            secret: SecretString::new(config.secret.clone().into_boxed_str()),
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
            issuer: config.issuer.clone(),
            cache,
            users,
        }
    }

    fn key(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }

    // =========================================================================
    // 발급
    // =========================================================================

    /// 토큰 쌍을 발급합니다.
    ///
    /// 클레임의 권한은 `user`의 현재 역할에서 계산합니다. Access Token 클레임은
    /// 캐시에 Access Token 수명과 같은 TTL로 저장됩니다.
    pub async fn issue_token_pair(&self, user: &User) -> ServiceResult<TokenPair> {
        let issuer = self.issuer.as_deref();
        let access = Claims::for_user(user, TokenKind::Access, self.access_ttl, issuer);
        let refresh = Claims::for_user(user, TokenKind::Refresh, self.refresh_ttl, issuer);

        let access_token = create_token(&access, self.key()).map_err(signing_failed)?;
        let refresh_token = create_token(&refresh, self.key()).map_err(signing_failed)?;

        self.cache
            .set_json(
                &keys::auth_token(&token_digest(&access_token)),
                &access,
                Some(self.access_ttl),
            )
            .await;

        metrics::counter!("tms_auth_tokens_issued_total").increment(1);
        debug!(user_id = %user.id, jti = %access.jti, "Token pair issued");

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.as_secs(),
            token_type: "Bearer".to_string(),
        })
    }

    // =========================================================================
    // 검증
    // =========================================================================

    /// Access Token을 검증합니다.
    ///
    /// 순서: 거부 목록 → 캐시된 클레임 → 서명 검증 (성공 시 캐시 재적재).
    pub async fn verify_access(&self, token: &str) -> ServiceResult<Claims> {
        let digest = token_digest(token);

        if self.cache.contains(&keys::auth_revoked(&digest)).await {
            record_failure("revoked");
            return Err(ServiceError::Unauthenticated(
                "폐기된 토큰입니다".to_string(),
            ));
        }

        let cache_key = keys::auth_token(&digest);
        if let Some(claims) = self.cache.get_json::<Claims>(&cache_key).await {
            if claims.token_type == TokenKind::Access && !claims.is_expired() {
                return Ok(claims);
            }
            self.cache.delete(&cache_key).await;
        }

        let claims = self.decode(token, TokenKind::Access)?;

        let ttl = claims.remaining().min(self.access_ttl);
        self.cache.set_json(&cache_key, &claims, Some(ttl)).await;
        Ok(claims)
    }

    /// Refresh Token으로 새 토큰 쌍을 발급합니다.
    ///
    /// 사용자를 다시 조회하며 존재하지 않거나 비활성이면 `Unauthenticated`입니다.
    /// 권한은 이전 클레임이 아닌 현재 역할에서 다시 계산됩니다.
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<(TokenPair, User)> {
        if self
            .cache
            .contains(&keys::auth_revoked(&token_digest(refresh_token)))
            .await
        {
            record_failure("revoked");
            return Err(ServiceError::Unauthenticated(
                "폐기된 토큰입니다".to_string(),
            ));
        }

        let claims = self.decode(refresh_token, TokenKind::Refresh)?;

        let user = match self.users.find_by_id(claims.sub).await? {
            Some(user) if user.is_active => user,
            _ => {
                warn!(user_id = %claims.sub, "Refresh rejected: user missing or inactive");
                record_failure("inactive_user");
                return Err(ServiceError::Unauthenticated(
                    "사용자를 찾을 수 없거나 비활성 상태입니다".to_string(),
                ));
            }
        };

        let pair = self.issue_token_pair(&user).await?;
        info!(user_id = %user.id, "Token pair refreshed");
        Ok((pair, user))
    }

    // =========================================================================
    // 폐기
    // =========================================================================

    /// 토큰을 폐기합니다.
    ///
    /// 이미 만료되었거나 서명이 잘못된 토큰은 폐기할 것이 없으므로 성공으로 처리합니다.
    pub async fn revoke(&self, token: &str) -> ServiceResult<()> {
        let digest = token_digest(token);
        self.cache.delete(&keys::auth_token(&digest)).await;

        let remaining = match decode_token(token, self.key(), TokenKind::Access, self.issuer.as_deref())
            .or_else(|_| {
                decode_token(token, self.key(), TokenKind::Refresh, self.issuer.as_deref())
            }) {
            Ok(claims) => claims.remaining(),
            Err(_) => return Ok(()),
        };

        if !remaining.is_zero() {
            self.cache
                .set_raw(&keys::auth_revoked(&digest), "1", Some(remaining))
                .await;
        }
        debug!("Token revoked");
        Ok(())
    }

    fn decode(&self, token: &str, kind: TokenKind) -> ServiceResult<Claims> {
        decode_token(token, self.key(), kind, self.issuer.as_deref()).map_err(|e| {
            let reason = match e {
                JwtError::TokenExpired => "expired",
                JwtError::InvalidSignature => "bad_signature",
                JwtError::WrongKind => "wrong_kind",
                _ => "malformed",
            };
            record_failure(reason);
            ServiceError::Unauthenticated(e.to_string())
        })
    }
}

fn signing_failed(err: JwtError) -> ServiceError {
    ServiceError::Internal(format!("토큰 서명 실패: {}", err))
}

fn record_failure(reason: &'static str) {
    metrics::counter!("tms_auth_token_rejections_total", "reason" => reason).increment(1);
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryStore, NewRole, NewUser, RoleStore, UserChanges};

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn config() -> JwtConfig {
        JwtConfig {
            secret: TEST_SECRET.to_string(),
            access_ttl: "15m".to_string(),
            refresh_ttl: "7d".to_string(),
            issuer: None,
        }
    }

    async fn setup() -> (TokenService, Arc<MemoryStore>, Cache, User) {
        let store = Arc::new(MemoryStore::new());
        let role = RoleStore::insert(
            store.as_ref(),
            NewRole {
                name: "dispatcher".to_string(),
                description: None,
                permissions: vec!["order:create".to_string(), "order:read".to_string()],
            },
        )
        .await
        .unwrap();
        let user = UserStore::insert(
            store.as_ref(),
            NewUser {
                email: "dispatch@example.com".to_string(),
                password_hash: "hash".to_string(),
                first_name: "Yuna".to_string(),
                last_name: "Lee".to_string(),
                is_active: true,
                role_ids: vec![role.id],
            },
        )
        .await
        .unwrap();

        let cache = Cache::in_memory(Duration::from_secs(3600));
        let service = TokenService::new(&config(), cache.clone(), store.clone());
        (service, store, cache, user)
    }

    #[tokio::test]
    async fn test_issue_then_verify() {
        let (service, _, cache, user) = setup().await;
        let pair = service.issue_token_pair(&user).await.unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert!(cache
            .contains(&keys::auth_token(&token_digest(&pair.access_token)))
            .await);

        let claims = service.verify_access(&pair.access_token).await.unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.permissions, vec!["order:create", "order:read"]);
    }

    #[tokio::test]
    async fn test_cache_miss_falls_back_to_signature() {
        let (service, _, cache, user) = setup().await;
        let pair = service.issue_token_pair(&user).await.unwrap();
        let key = keys::auth_token(&token_digest(&pair.access_token));

        cache.delete(&key).await;
        let claims = service.verify_access(&pair.access_token).await.unwrap();
        assert_eq!(claims.email, "dispatch@example.com");

        // 캐시가 다시 채워짐
        assert!(cache.contains(&key).await);
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let (service, _, _, user) = setup().await;
        let pair = service.issue_token_pair(&user).await.unwrap();

        service.revoke(&pair.access_token).await.unwrap();
        let err = service.verify_access(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let (service, _, _, user) = setup().await;
        let pair = service.issue_token_pair(&user).await.unwrap();

        assert!(service.verify_access(&pair.refresh_token).await.is_err());
        assert!(service.refresh(&pair.access_token).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_requires_active_user() {
        let (service, store, _, user) = setup().await;
        let pair = service.issue_token_pair(&user).await.unwrap();

        let (new_pair, refreshed) = service.refresh(&pair.refresh_token).await.unwrap();
        assert_eq!(refreshed.id, user.id);
        assert!(service.verify_access(&new_pair.access_token).await.is_ok());

        UserStore::update(
            store.as_ref(),
            user.id,
            UserChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let (service, _, _, _) = setup().await;
        assert!(matches!(
            service.verify_access("not-a-token").await,
            Err(ServiceError::Unauthenticated(_))
        ));
        // 폐기할 것이 없으면 성공
        assert!(service.revoke("not-a-token").await.is_ok());
    }
}
