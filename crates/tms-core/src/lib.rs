//! # TMS Core
//!
//! TMS 인증/CRUD 미들웨어의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 서비스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 사용자, 역할, 권한 집계
//! - 운송 주문, 주소, 상태 전이 규칙
//! - 서비스 에러 분류
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use self::config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
