//! tracing 기반 로깅 초기화.
//!
//! 출력 형식은 `logging.format`으로 고릅니다:
//! - **pretty**: 개발용
//! - **json**: 로그 수집기용 (한 줄 JSON)
//! - **compact**: 한 줄 요약
//!
//! `RUST_LOG`가 있으면 설정 파일의 레벨보다 우선합니다. 설정 파일 레벨을 쓸 때는
//! 드라이버 크레이트(sqlx, redis, hyper)의 잡음을 줄이는 기본 지시어가 덧붙습니다.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    filter::ParseError,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

/// 설정 파일 레벨 뒤에 붙는 기본 지시어.
const QUIET_DIRECTIVES: [&str; 3] = ["sqlx=warn", "redis=warn", "hyper=info"];

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

/// 구독자 초기화 옵션.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 필터 지시어 (예: "info", "tms_api=debug")
    pub level: String,
    pub format: LogFormat,
    /// span 종료 이벤트 출력 (RPC 호출 소요 시간 확인용)
    pub with_span_events: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    /// 설정 레벨에 기본 지시어를 붙인 필터 문자열.
    ///
    /// 사용자가 같은 크레이트를 직접 지정했다면 그 지시어를 덮어쓰지 않습니다.
    pub fn directives(&self) -> String {
        let mut directives = vec![self.level.trim().to_string()];
        for quiet in QUIET_DIRECTIVES {
            let target = quiet.split('=').next().unwrap_or(quiet);
            if !self.level.contains(target) {
                directives.push(quiet.to_string());
            }
        }
        directives.retain(|d| !d.is_empty());
        directives.join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter, ParseError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(self.directives()),
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.with_span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_target(self.with_target)
            .with_span_events(span_events);

        match self.format {
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Json => base.json().flatten_event(true).boxed(),
            LogFormat::Compact => base.compact().boxed(),
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self::new(config.level.clone()).with_format(config.format)
    }
}

/// 전역 구독자를 설치합니다. 프로세스당 한 번만 성공합니다.
///
/// ```no_run
/// use tms_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = config.env_filter()?;

    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(filter)
        .try_init()?;

    tracing::info!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}
