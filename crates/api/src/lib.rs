//! Stress Pipeline API Server
//!
//! Ingestion REST endpoints and the WebSocket stream for the stress dashboard.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod broadcast;
pub mod config;
pub mod error;
mod routes;
pub mod service;

pub use self::config::{load_config, AppConfig, LogFormat, StreamConfig, StreamSource};
pub use error::{ApiError, StartupError};
pub use service::{Classification, IngestionService, LiveSample};

use alerting::{AlertDispatcher, Notifier, SmsNotifier, StressClassifier};
use broadcast::{ClientRegistry, FrameSource, LiveSource, SyntheticSource};
use cloud_sync::TelemetryForwarder;
use data_validator::Validator;
use inference_engine::{StressPredictor, TrainedArtifact};
use storage::{Repository, TelemetryLog};

/// Application state shared across handlers
pub struct AppState {
    pub ingestion: IngestionService,
    pub registry: Arc<ClientRegistry>,
    pub validator: Validator,
    pub stream: StreamConfig,
    /// Prometheus exporter, when installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(ingestion: IngestionService, stream: StreamConfig) -> Self {
        Self {
            ingestion,
            registry: Arc::new(ClientRegistry::new()),
            validator: Validator::default(),
            stream,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build every component from configuration. A missing or inconsistent
    /// model artifact is fatal.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let artifact = TrainedArtifact::load(&config.model)?;
        let predictor = StressPredictor::new(Arc::new(artifact));
        let classifier = StressClassifier::new(config.thresholds)?;

        let notifier: Option<Arc<dyn Notifier>> = if config.alert.sms.is_configured() {
            Some(Arc::new(SmsNotifier::new(config.alert.sms.clone())))
        } else {
            None
        };
        let dispatcher = Arc::new(AlertDispatcher::new(notifier, &config.alert));
        let repository = Arc::new(Repository::new(config.storage.history_limit));

        let mut ingestion = IngestionService::new(predictor, classifier, dispatcher, repository);
        if let Some(forwarder) = TelemetryForwarder::from_config(&config.telemetry) {
            ingestion = ingestion.with_forwarder(Arc::new(forwarder));
        }
        if let Some(path) = config.storage.csv_path() {
            let log = TelemetryLog::open(&path).await?;
            ingestion = ingestion.with_telemetry_log(Arc::new(log));
        }

        Ok(Self::new(ingestion, config.stream.clone()))
    }

    /// Fresh frame source for one stream connection
    pub fn frame_source(&self) -> Box<dyn FrameSource> {
        match self.stream.source {
            StreamSource::Synthetic => Box::new(SyntheticSource::new()),
            StreamSource::Live => Box::new(LiveSource::new(self.ingestion.subscribe_live())),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
    pub metrics: SystemMetrics,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub model: ModelHealth,
    pub alerting: alerting::AlertStatus,
}

#[derive(Debug, Serialize)]
pub struct ModelHealth {
    pub kind: &'static str,
    pub features: usize,
    pub thresholds: alerting::StressThresholds,
}

#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub stream_clients: usize,
    pub sensor_count: usize,
    pub classification_count: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/sensor_data",
            get(routes::ingest::get_sensor_data).post(routes::ingest::post_sensor_data),
        )
        .route("/log", post(routes::ingest::post_log))
        .route("/ws", get(routes::stream::ws_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/readings", get(routes::readings::get_readings))
        .route("/api/v1/classifications", get(routes::readings::get_classifications))
        .route("/api/v1/alerts", get(routes::alerts::get_alerts))
        .route("/api/v1/stream/clients", get(routes::stream::get_clients))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let ingestion = &state.ingestion;
    let artifact = ingestion.predictor().artifact();

    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            model: ModelHealth {
                kind: artifact.model().kind(),
                features: artifact.feature_names().len(),
                thresholds: ingestion.classifier().thresholds(),
            },
            alerting: ingestion.dispatcher().status(),
        },
        metrics: SystemMetrics {
            stream_clients: state.registry.len(),
            sensor_count: ingestion.repository().sensor_count(),
            classification_count: ingestion.repository().classification_count(),
        },
    };

    Json(response)
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response(),
    }
}

/// Initialize logging; `RUST_LOG` overrides the default `info` filter
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = result {
        eprintln!("Logging already initialized: {e}");
    }
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus exporter unavailable: {}", e);
            None
        }
    }
}

/// Run the server until Ctrl-C
pub async fn run_server(config: AppConfig) -> Result<(), StartupError> {
    let mut state = AppState::from_config(&config).await?;
    if let Some(handle) = install_metrics() {
        state = state.with_metrics(handle);
    }
    let app = create_router(Arc::new(state));

    info!("Starting API server on {}", config.server.addr);

    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
