//! TMS 백엔드 HTTP 클라이언트.
//!
//! 현재는 상세 헬스 체크에서만 사용합니다. 백엔드 장애는 서비스 상태를
//! `degraded`로 낮출 뿐 트래픽 수신을 막지 않습니다.

use std::time::Duration;
use tms_core::TmsBackendConfig;
use tracing::debug;

/// 백엔드 헬스 엔드포인트 클라이언트.
#[derive(Debug, Clone)]
pub struct TmsBackendClient {
    client: reqwest::Client,
    health_url: String,
    timeout: Duration,
}

impl TmsBackendClient {
    /// 설정에 URL이 없으면 `None`.
    pub fn from_config(config: &TmsBackendConfig) -> Result<Option<Self>, reqwest::Error> {
        let Some(health_url) = config.health_url() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()?;

        Ok(Some(Self {
            client,
            health_url,
            timeout: config.timeout(),
        }))
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    /// `GET <health_url>`. 2xx가 아니거나 시간 안에 응답이 없으면 에러입니다.
    pub async fn check_health(&self) -> Result<(), reqwest::Error> {
        let response = self.client.get(&self.health_url).send().await?;
        let status = response.status();
        response.error_for_status()?;

        debug!(
            url = %self.health_url,
            status = status.as_u16(),
            timeout_ms = self.timeout.as_millis() as u64,
            "TMS backend responded"
        );
        Ok(())
    }
}
