//! 비밀번호 해싱 유틸리티.
//!
//! Argon2 기반 비밀번호 해싱 및 검증. 해싱은 CPU 집약 작업이므로
//! 비동기 경로에서는 `spawn_blocking` 래퍼를 사용합니다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tms_core::ServiceError;

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("비밀번호 검증 실패")]
    VerificationFailed,
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
}

/// 비밀번호 해싱.
///
/// Argon2id 알고리즘을 사용하며 솔트는 자동으로 생성됩니다.
/// PHC 형식의 해시 문자열 (솔트 포함)을 반환합니다.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| PasswordError::HashingFailed)?;

    Ok(hash.to_string())
}

/// 비밀번호 검증.
///
/// 비밀번호가 일치하면 Ok(()), 불일치하면 Err.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// blocking 풀에서 해싱합니다.
pub async fn hash_password_blocking(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("해싱 작업 실패: {}", e)))?
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

/// blocking 풀에서 검증합니다. 일치 여부를 반환합니다.
///
/// 저장된 해시 형식이 잘못된 경우도 불일치로 처리합니다.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, ServiceError> {
    let outcome = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::Internal(format!("검증 작업 실패: {}", e)))?;

    match outcome {
        Ok(()) => Ok(true),
        Err(PasswordError::InvalidHashFormat) => {
            tracing::error!("Stored password hash is not a valid PHC string");
            Ok(false)
        }
        Err(_) => Ok(false),
    }
}
