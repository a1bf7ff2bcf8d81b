//! TCP RPC 어댑터.
//!
//! HTTP 라우트와 같은 서비스와 권한 가드를 줄 단위 JSON 프로토콜로 노출합니다.
//!
//! - [`envelope`]: 요청/응답 봉투
//! - [`dispatch`]: 패턴 → 서비스 호출, 호출 타임아웃
//! - [`server`]: TCP 리스너와 연결 처리

pub mod dispatch;
pub mod envelope;
pub mod server;

pub use dispatch::RpcDispatcher;
pub use envelope::{RpcError, RpcRequest, RpcResponse};
pub use server::RpcServer;
