//! TCP RPC 서버.
//!
//! 연결마다 태스크 하나를 띄우고, 줄 단위 JSON 프레임을 순서대로 처리합니다.
//! 응답은 요청 순서와 같습니다.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tms_core::{RpcConfig, ServiceError};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dispatch::RpcDispatcher;
use super::envelope::RpcResponse;
use crate::state::AppState;

/// TCP RPC 서버.
#[derive(Debug, Clone)]
pub struct RpcServer {
    dispatcher: RpcDispatcher,
    max_frame_bytes: usize,
}

impl RpcServer {
    pub fn new(state: Arc<AppState>, config: &RpcConfig) -> Self {
        Self {
            dispatcher: RpcDispatcher::new(state, config.call_timeout()),
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// 종료 신호까지 연결을 받습니다.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            call_timeout_ms = self.dispatcher.call_timeout().as_millis() as u64,
            "RPC server listening"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("RPC server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!(peer = %addr, "RPC client connected");
                            let server = self.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                server.handle_connection(stream, addr, shutdown).await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept RPC connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, shutdown: CancellationToken) {
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(self.max_frame_bytes));

        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => break,
                frame = framed.next() => frame,
            };

            let response = match frame {
                None => break,
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => self.dispatcher.handle_frame(&line).await,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!(peer = %addr, max_frame_bytes = self.max_frame_bytes, "RPC frame too large");
                    let response = RpcResponse::failure(
                        None,
                        &ServiceError::InvalidInput(format!(
                            "프레임이 최대 크기({} bytes)를 넘었습니다",
                            self.max_frame_bytes
                        )),
                    );
                    if let Err(e) = send(&mut framed, &response).await {
                        debug!(peer = %addr, error = %e, "RPC connection write failed");
                    }
                    break;
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    debug!(peer = %addr, error = %e, "RPC connection read failed");
                    break;
                }
            };

            if let Err(e) = send(&mut framed, &response).await {
                debug!(peer = %addr, error = %e, "RPC connection write failed");
                break;
            }
        }

        debug!(peer = %addr, "RPC client disconnected");
    }
}

async fn send(
    framed: &mut Framed<TcpStream, LinesCodec>,
    response: &RpcResponse,
) -> Result<(), LinesCodecError> {
    let encoded = serde_json::to_string(response)
        .map_err(|e| LinesCodecError::Io(std::io::Error::other(e)))?;
    framed.send(encoded).await
}
