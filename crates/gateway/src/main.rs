//! SessionVault API Gateway
//!
//! The HTTP entry point for session records.
//! Handles:
//! - Request routing to the session repository
//! - Token gating for caller-scoped routes
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    extract::FromRef,
    http::Method,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    routing::post,
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use sessionvault_common::{
    auth::JwtManager,
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    errors::AppError,
    metrics,
};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, sync::Notify};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtManager>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting SessionVault API Gateway v{}", sessionvault_common::VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .add_global_label("service", config.observability.service_name.clone())
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .install()?;
        metrics::register_metrics();
        info!("Metrics exporter listening on {}", addr);
    }

    let jwt_secret = config.auth.jwt_secret.as_deref().ok_or_else(|| {
        let e = AppError::Configuration {
            message: "auth.jwt_secret must be set (APP__AUTH__JWT_SECRET)".to_string(),
        };
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    let jwt = JwtManager::new(jwt_secret, config.auth.jwt_expiration_secs)
        .with_token_cookie(config.auth.token_cookie.clone());

    // Initialize database connection
    let db = DbPool::new(&config.database).await.map_err(|e| {
        error!(error = %e, "Database unavailable at startup");
        e
    })?;

    // Create app state
    let state = AppState {
        config: config.clone(),
        db: db.clone(),
        jwt: Arc::new(jwt),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!(
        service = %config.observability.service_name,
        "Listening on {}",
        listener.local_addr()?
    );

    serve(listener, app, shutdown_signal(), config.shutdown_timeout()).await?;

    db.close().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Serve until `signal` fires, then give open connections `grace` to finish
async fn serve<F>(
    listener: tokio::net::TcpListener,
    app: Router,
    signal: F,
    grace: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, app)
        .with_graceful_shutdown({
            let draining = draining.clone();
            async move {
                signal.await;
                draining.notify_one();
            }
        })
        .into_future();

    tokio::select! {
        result = server => result,
        _ = async {
            draining.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                timeout_secs = grace.as_secs(),
                "Connections still open after shutdown timeout, closing anyway"
            );
            Ok(())
        }
    }
}

fn init_tracing(observability: &ObservabilityConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Static segments take precedence over `{id}`
    let session_routes = Router::new()
        .route("/api/session", post(handlers::sessions::create_session))
        .route("/api/session/", post(handlers::sessions::create_session))
        .route("/api/session/list", post(handlers::sessions::list_sessions))
        .route("/api/session/getSession", get(handlers::sessions::list_sessions_default))
        .route("/api/session/all", get(handlers::sessions::all_sessions))
        .route("/api/session/check-auth", get(handlers::sessions::check_auth))
        .route("/api/session/detail", get(handlers::sessions::current_session))
        .route(
            "/api/session/{id}",
            get(handlers::sessions::get_session)
                .put(handlers::sessions::update_session)
                .delete(handlers::sessions::delete_session),
        );

    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(session_routes)
        .route_layer(from_fn(middleware::metrics::track_metrics));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    app.layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use sessionvault_common::config::DatabaseConfig;
    use tokio::io::AsyncWriteExt;
    use tower::ServiceExt;

    async fn app_with(config: AppConfig) -> Router {
        let db = DbPool::new(&config.database).await.unwrap();
        create_router(AppState {
            config: Arc::new(config),
            db,
            jwt: Arc::new(JwtManager::new("test_secret", 60)),
        })
    }

    fn in_memory_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig::in_memory(),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = app_with(in_memory_config()).await;

        for uri in ["/health", "/ready"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = app_with(in_memory_config()).await;

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_shutdown_drain_is_bounded() {
        let app = app_with(in_memory_config()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // A request whose headers never finish keeps its connection busy
        let mut stalled = tokio::net::TcpStream::connect(addr).await.unwrap();
        stalled.write_all(b"GET /health HTTP/1.1\r\nHost: x\r\n").await.unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            app,
            async move {
                let _ = stopped.await;
            },
            Duration::from_millis(100),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.send(()).unwrap();

        let finished = tokio::time::timeout(Duration::from_secs(5), server).await;
        assert!(finished.expect("server outlived its grace period").unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_over_burst() {
        let mut config = in_memory_config();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let app = app_with(config).await;

        let first = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
