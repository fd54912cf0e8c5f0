//! Server crate provides HTTP server functionality.
//!
//! This module implements the HTTP surface of the business directory:
//! creating online/physical businesses, fetching a business with its review
//! aggregates, and attaching reviews, plus health and metrics endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path as AxumPath, State, rejection::JsonRejection},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use model::{CreateBusiness, CreateReview};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use service::{BusinessService, ServiceError};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Server represents an HTTP server for the business directory.
pub struct Server {
    service: Arc<dyn BusinessService>,
    port: String,
    metrics: Arc<Metrics>,
}

/// Metrics collects and exposes HTTP server metrics.
struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .expect("Failed to create http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )
        .expect("Failed to create http_request_duration_seconds metric");

        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of errors"),
            &["source", "endpoint"],
        )
        .expect("Failed to create errors_total metric");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("Failed to register http_requests_total metric");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("Failed to register http_request_duration_seconds metric");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("Failed to register errors_total metric");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
        }
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    fn record_error(&self, source: &str, endpoint: &str) {
        self.errors_total
            .with_label_values(&[source, endpoint])
            .inc();
    }
}

impl Server {
    /// Creates a new Server instance.
    ///
    /// # Arguments
    ///
    /// * `port` - The port on which the server will listen
    /// * `service` - The business service handling directory operations
    pub fn new(port: String, service: Arc<dyn BusinessService>) -> Self {
        info!("Initializing HTTP server on port {}", port);

        Self {
            service,
            port,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Starts the server and blocks until it's shut down.
    pub async fn start(&self) -> Result<()> {
        let app = self.create_router();

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    fn create_router(&self) -> Router {
        let metrics = self.metrics.clone();
        let service = self.service.clone();

        Router::new()
            .route("/business", post(Self::handle_create_business))
            .route("/business/{id}", get(Self::handle_get_business))
            .route("/business/{id}/reviews", post(Self::handle_create_review))
            .route("/health", get(Self::handle_health))
            .route("/metrics", get(Self::handle_metrics))
            .fallback(Self::handle_unmatched)
            .method_not_allowed_fallback(Self::handle_unmatched)
            .layer(axum::middleware::from_fn_with_state(
                metrics.clone(),
                Self::metrics_middleware,
            ))
            .with_state(AppState { service, metrics })
    }

    /// Middleware for collecting metrics on HTTP requests
    async fn metrics_middleware(
        State(metrics): State<Arc<Metrics>>,
        req: axum::extract::Request,
        next: axum::middleware::Next,
    ) -> Response {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let start = std::time::Instant::now();
        let response = next.run(req).await;
        let duration = start.elapsed();

        let status = response.status().as_u16();
        metrics.record_request(&method, &path, status, duration);
        if status >= 400 {
            metrics.record_error("http", &path);
        }

        response
    }

    async fn handle_create_business(
        State(state): State<AppState>,
        body: Result<Json<CreateBusiness>, JsonRejection>,
    ) -> Response {
        let Json(input) = match body {
            Ok(json) => json,
            Err(rejection) => {
                warn!("Rejected business payload: {}", rejection);
                return (
                    StatusCode::BAD_REQUEST,
                    format!("invalid request body: {rejection}"),
                )
                    .into_response();
            }
        };

        info!("Received request to create a business");
        match state.service.create_business(input).await {
            Ok(business) => (StatusCode::CREATED, Json(business)).into_response(),
            Err(err) => service_error_response(err),
        }
    }

    async fn handle_get_business(
        State(state): State<AppState>,
        AxumPath(business_id): AxumPath<String>,
    ) -> Response {
        info!("Received business request for ID: {}", business_id);

        if business_id.is_empty() {
            warn!("Business ID is missing in request");
            return (StatusCode::BAD_REQUEST, "business id is required").into_response();
        }

        match state.service.get_business(&business_id).await {
            Ok(business) => (StatusCode::OK, Json(business)).into_response(),
            Err(err) => service_error_response(err),
        }
    }

    async fn handle_create_review(
        State(state): State<AppState>,
        AxumPath(business_id): AxumPath<String>,
        body: Result<Json<CreateReview>, JsonRejection>,
    ) -> Response {
        let Json(input) = match body {
            Ok(json) => json,
            Err(rejection) => {
                warn!("Rejected review payload: {}", rejection);
                return (
                    StatusCode::BAD_REQUEST,
                    format!("invalid request body: {rejection}"),
                )
                    .into_response();
            }
        };

        info!("Received review request for business ID: {}", business_id);
        match state.service.create_review(&business_id, input).await {
            Ok(review) => (StatusCode::CREATED, Json(review)).into_response(),
            Err(err) => service_error_response(err),
        }
    }

    async fn handle_health() -> &'static str {
        info!("Health check requested");
        "OK"
    }

    async fn handle_metrics(State(state): State<AppState>) -> Response {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
        }

        match String::from_utf8(buffer) {
            Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
            Err(e) => {
                error!("Failed to convert metrics to UTF-8: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Invalid metrics data").into_response()
            }
        }
    }

    /// Fallback for any method/path combination without a handler.
    async fn handle_unmatched(method: Method, uri: Uri) -> Response {
        warn!("No route for {} {}", method, uri.path());
        (
            StatusCode::NOT_FOUND,
            format!("no route for {} {}", method, uri.path()),
        )
            .into_response()
    }
}

/// Maps the service error taxonomy onto HTTP responses. Storage failures
/// are logged in full server-side; the client only sees a generic message.
fn service_error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::InvalidInput(message) => {
            warn!("Rejected invalid input: {}", message);
            (StatusCode::BAD_REQUEST, message).into_response()
        }
        ServiceError::NotFound => (StatusCode::NOT_FOUND, "business not found").into_response(),
        ServiceError::Db(cause) => {
            error!("Storage error: {}", cause);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal storage error").into_response()
        }
    }
}

/// Application state shared between request handlers
#[derive(Clone)]
struct AppState {
    service: Arc<dyn BusinessService>,
    metrics: Arc<Metrics>,
}

/// Waits for a shutdown signal (Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
