//! 인증 및 권한 부여.
//!
//! JWT 기반 인증과 작업별 역할 허용 목록(권한 가드)을 제공합니다.
//!
//! # 구성 요소
//!
//! - [`Claims`]: JWT 페이로드 구조체
//! - [`TokenService`]: 토큰 발급/검증/폐기 (캐시 허용 목록 + 거부 목록)
//! - [`AccessPolicy`]: 작업 → 허용 역할 맵
//! - [`JwtAuth`]: Axum 핸들러용 인증 추출기
//! - 비밀번호 해싱 함수
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(
//!     State(state): State<Arc<AppState>>,
//!     auth: JwtAuth,
//! ) -> ApiResult<Json<User>> {
//!     auth.authorize(&state.policy, Operation::UserFindById)?;
//!     // ...
//! }
//! ```

mod jwt;
mod middleware;
mod password;
mod policy;
mod token_service;

pub use jwt::{create_token, decode_token, Claims, JwtError, TokenKind};
pub use middleware::{bearer_token, JwtAuth};
pub use password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking,
    PasswordError,
};
pub use policy::{Access, AccessPolicy, Operation};
pub use token_service::{token_digest, TokenPair, TokenService};
