//! Staffing Backend - library for app logic and testing

pub mod config;
pub mod dates;
pub mod db;
pub mod dto;
pub mod error;
pub mod logging;
pub mod response;
pub mod routes;
pub mod validation;

use anyhow::Context;
use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::db::Store;
use crate::error::AppError;
use crate::logging::LogConfig;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

/// CORS for the configured frontend origins.
pub fn configure_cors(config: &AppConfig) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = config
        .frontend_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// The body limit layer rejects oversized declared lengths with a plain-text
/// 413; give it the API envelope.
async fn payload_too_large_envelope(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return AppError::PayloadTooLarge.into_response();
    }
    response
}

/// Create and configure the application router.
pub fn create_app(state: AppState, config: &AppConfig) -> Router {
    let app = Router::new()
        .nest("/api", routes::api_router())
        .fallback(routes::not_found)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        // Global 2 MB request body cap
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(middleware::map_response(payload_too_large_envelope));

    match config.enable_cors {
        true => {
            tracing::info!(origins = ?config.frontend_origins, "CORS enabled");
            app.layer(configure_cors(config))
        }
        false => app,
    }
}

/// Run the server (used by main).
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Guards must be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init(&LogConfig::from_env(config.environment));

    routes::health::init_start_time();

    let store = db::open_store(&config.store)
        .await
        .context("Failed to open the data store")?;

    let app = create_app(AppState { store }, &config);

    let addr: SocketAddr = config
        .server_address()
        .parse()
        .with_context(|| format!("Invalid HOST/PORT: {}", config.server_address()))?;
    tracing::info!(
        environment = config.environment.as_str(),
        "Starting server on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/employees")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let cfg = config(&[("FRONTEND_ORIGIN", "https://staff.example")]);
        let app = create_app(
            AppState {
                store: Arc::new(MemoryStore::new()),
            },
            &cfg,
        );
        let res = app.oneshot(preflight("https://staff.example")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://staff.example"
        );
    }

    #[tokio::test]
    async fn test_cors_disabled_sends_no_headers() {
        let cfg = config(&[("ENABLE_CORS", "false")]);
        let app = create_app(
            AppState {
                store: Arc::new(MemoryStore::new()),
            },
            &cfg,
        );
        let res = app
            .oneshot(
                Request::get("/api/employees")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let app = create_app(
            AppState {
                store: Arc::new(MemoryStore::new()),
            },
            &config(&[]),
        );
        let res = app
            .oneshot(
                Request::post("/api/events")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert!(json["error"]["details"]["formErrors"][0].is_string());
    }

    async fn oversized_post(declare_length: bool) -> (StatusCode, serde_json::Value) {
        let app = create_app(
            AppState {
                store: Arc::new(MemoryStore::new()),
            },
            &config(&[]),
        );
        let payload = vec![b' '; BODY_LIMIT_BYTES + 1];
        let mut req = Request::post("/api/employees").header(header::CONTENT_TYPE, "application/json");
        if declare_length {
            req = req.header(header::CONTENT_LENGTH, payload.len());
        }
        let res = app.oneshot(req.body(Body::from(payload)).unwrap()).await.unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_oversized_body_is_413_envelope() {
        for declare_length in [true, false] {
            let (status, json) = oversized_post(declare_length).await;
            assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
            assert_eq!(json["ok"], false);
            assert_eq!(json["error"]["code"], "PAYLOAD_TOO_LARGE");
        }
    }
}
