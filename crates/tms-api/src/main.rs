//! TMS 미들웨어 서버.
//!
//! REST API(axum)와 TCP RPC 서버를 함께 시작합니다. 두 전송 계층은 같은
//! [`AppState`]를 공유합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use tms_api::auth::AccessPolicy;
use tms_api::metrics::setup_metrics_recorder;
use tms_api::middleware::{metrics_layer, request_timeout};
use tms_api::openapi::swagger_ui_router;
use tms_api::repository::PgStore;
use tms_api::routes::create_api_router;
use tms_api::rpc::RpcServer;
use tms_api::services::ensure_admin;
use tms_api::state::{AppState, Stores};
use tms_cache::Cache;
use tms_core::{init_logging, AppConfig, LogConfig, ServerConfig};

/// CORS 미들웨어 구성.
///
/// `server.cors_origins`가 비어 있으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let restricted = !origins.is_empty();
    let allow_origin = if restricted {
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    } else {
        warn!("server.cors_origins not set, allowing any origin (development mode)");
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle, config: &ServerConfig) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router(&config.api_prefix).with_state(state))
        // OpenAPI 문서 및 Swagger UI
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(
            config.request_timeout(),
            request_timeout,
        ))
        .layer(cors_layer(config))
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그가 있으면 스펙을 stdout으로 출력하고 `true`를 반환합니다.
fn handle_export_openapi() -> Result<bool, serde_json::Error> {
    use tms_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    if !std::env::args().any(|arg| arg == "--export-openapi") {
        return Ok(false);
    }
    println!("{}", serde_json::to_string_pretty(&ApiDoc::openapi())?);
    Ok(true)
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, std::net::AddrParseError> {
    format!("{}:{}", host, port).parse()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    if handle_export_openapi()? {
        return Ok(());
    }

    let config = AppConfig::load_default()?;
    init_logging(LogConfig::from(&config.logging))?;

    info!("Starting TMS middleware...");

    let metrics_handle = setup_metrics_recorder()?;
    info!("Prometheus metrics recorder initialized");

    let addr = socket_addr(&config.server.host, config.server.port).map_err(|e| {
        error!(
            host = %config.server.host,
            port = config.server.port,
            error = %e,
            "소켓 주소 설정이 유효하지 않습니다. server.host, server.port를 확인하세요."
        );
        e
    })?;

    // 데이터베이스
    let db = PgStore::connect(&config.database).await.map_err(|e| {
        error!(error = %e, "Failed to connect to database");
        e
    })?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    // 캐시 (연결 실패 시 캐시 없이 동작)
    let cache = Cache::from_config(&config.redis).await;
    let policy = AccessPolicy::from_config(&config.access)?;
    let stores = Stores::postgres(db.clone());

    let state = AppState::new(&config.jwt, policy, cache, stores.clone())
        .with_database(db)
        .with_tms_backend(&config.tms_backend)?;

    if let Some(bootstrap) = &config.bootstrap {
        match ensure_admin(bootstrap, stores.users.as_ref(), &state.users, &state.roles).await? {
            Some(admin) => info!(user_id = %admin.id, "Bootstrap admin created"),
            None => info!("Bootstrap admin already present"),
        }
    }

    let state = Arc::new(state);
    info!(
        version = %state.version,
        cache_backend = state.cache.backend(),
        "Application state initialized"
    );

    let shutdown_token = CancellationToken::new();

    // RPC 서버
    let rpc_handle = if config.rpc.enabled {
        let rpc_addr = socket_addr(&config.rpc.host, config.rpc.port)?;
        let listener = TcpListener::bind(rpc_addr).await?;
        let server = RpcServer::new(state.clone(), &config.rpc);
        let token = shutdown_token.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, token).await {
                error!(error = %e, "RPC server stopped with error");
            }
        }))
    } else {
        info!("RPC server disabled");
        None
    };

    let app = create_router(state, metrics_handle, &config.server);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if let Some(handle) = rpc_handle {
        if tokio::time::timeout(Duration::from_secs(10), handle).await.is_err() {
            warn!("RPC server did not stop in time, forcing shutdown");
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
