//! Lung Classifier API Server
//!
//! HTTP front end of the inference-serving pipeline: sessions submit
//! histopathology images and read back their cached prediction.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod rate_limit;
mod routes;
pub mod service;

pub use config::{AppConfig, ServerConfig};
pub use rate_limit::RateLimitConfig;
pub use service::{ClassificationService, ServiceError, SubmitOutcome, Upload};

use image_preprocessor::ImagePreprocessor;
use inference_engine::InferenceEngine;
use model_provider::{ModelAcquisitionError, ModelProvider};
use session_cache::SessionStore;

/// Application state shared across handlers
pub struct AppState {
    /// Prediction service
    pub service: Arc<ClassificationService>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus exporter, when installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(service: Arc<ClassificationService>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            service,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics,
        }
    }

    /// Wire up the production pipeline from configuration
    pub fn from_config(
        config: &AppConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, ModelAcquisitionError> {
        let provider = Arc::new(ModelProvider::from_config(&config.model)?);
        let service = ClassificationService::new(
            provider,
            ImagePreprocessor::new(config.preprocess.clone()),
            InferenceEngine::new(config.engine.clone()),
            Arc::new(SessionStore::new(config.server.max_sessions)),
        );
        Ok(Self::new(Arc::new(service), metrics))
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub model: ModelStatus,
    pub session_count: Option<usize>,
}

/// Model status
#[derive(Debug, Serialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub source: Option<String>,
    pub runtime: Option<&'static str>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub load_duration_seconds: Option<f64>,
    pub acquisition_attempts: u64,
}

/// Create the application router
pub fn create_router(
    state: Arc<AppState>,
    rate_limit: &RateLimitConfig,
    max_upload_bytes: usize,
) -> Router {
    let mut upload = post(routes::predictions::submit_prediction);
    if let Some(config) = rate_limit::create_governor_config(rate_limit) {
        upload = upload.layer(GovernorLayer { config });
    }

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/classes", get(routes::classes::list_classes))
        .route("/api/v1/sessions", post(routes::sessions::create_session))
        .route(
            "/api/v1/sessions/:session_id",
            delete(routes::sessions::delete_session),
        )
        .route("/api/v1/sessions/:session_id/predictions", upload)
        .route(
            "/api/v1/sessions/:session_id/prediction",
            get(routes::predictions::get_prediction).delete(routes::predictions::clear_prediction),
        )
        .route(
            "/api/v1/sessions/:session_id/image",
            get(routes::predictions::get_image),
        )
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let provider = state.service.provider();
    let model = provider.loaded();

    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        model: ModelStatus {
            loaded: model.is_some(),
            source: model.as_ref().map(|m| m.source().to_string()),
            runtime: model.as_ref().map(|m| m.runtime()),
            loaded_at: model.as_ref().map(|m| m.loaded_at()),
            load_duration_seconds: model.as_ref().map(|m| m.load_duration_secs()),
            acquisition_attempts: provider.attempts(),
        },
        session_count: state.service.sessions().len().ok(),
    };

    Json(response)
}

/// Prometheus metrics handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response(),
    }
}

/// Initialize logging
pub fn init_logging(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let level = config.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if config.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Run the server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics exporter unavailable: {}", e);
            None
        }
    };

    let state = Arc::new(AppState::from_config(&config, metrics)?);

    if config.server.preload_model {
        let service = Arc::clone(&state.service);
        tokio::spawn(async move {
            if let Err(e) = service.warm_up().await {
                error!("Model preload failed, will retry on first submission: {}", e);
            }
        });
    }

    let app = create_router(state, &config.rate_limit, config.server.max_upload_bytes);

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
