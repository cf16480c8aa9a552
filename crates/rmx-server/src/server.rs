//! `RmxServer`: Axum HTTP + `WebSocket` server around a [`JamBroker`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::handlers;
use crate::identity::{HeaderParticipantResolver, ParticipantResolver};
use crate::jam::JamBroker;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::jam_ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live room registry.
    pub broker: Arc<JamBroker>,
    /// Identity boundary for `WebSocket` admissions.
    pub resolver: Arc<dyn ParticipantResolver>,
    /// When the server started.
    pub start_time: Instant,
    /// Capacity for create requests that do not name one.
    pub default_capacity: usize,
    /// Largest inbound `WebSocket` message.
    pub max_message_size: usize,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The rmx server.
pub struct RmxServer {
    config: ServerConfig,
    broker: Arc<JamBroker>,
    resolver: Arc<dyn ParticipantResolver>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl RmxServer {
    /// Create a server over `broker` that identifies participants by header.
    pub fn new(config: ServerConfig, broker: Arc<JamBroker>) -> Self {
        Self {
            config,
            broker,
            resolver: Arc::new(HeaderParticipantResolver),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        }
    }

    /// Replace the participant resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ParticipantResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            broker: self.broker.clone(),
            resolver: self.resolver.clone(),
            start_time: self.start_time,
            default_capacity: self.config.default_capacity,
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/jam", get(handlers::list_jams).post(handlers::create_jam))
            .route(
                "/jam/{id}",
                get(handlers::get_jam).delete(handlers::delete_jam),
            )
            .route("/ws/jam/{id}", get(jam_ws_handler))
            .route("/health", get(handlers::health))
            .route("/ping", get(handlers::ping))
            .route("/metrics", get(handlers::metrics))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.config.allowed_origins))
    }

    /// Bind the configured address and serve until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port `0`) and the server task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, "rmx server listening");
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(e) = served {
                error!(error = %e, "server error");
            }
            info!("rmx server stopped accepting connections");
        });
        Ok((addr, handle))
    }

    /// The room registry.
    pub fn broker(&self) -> &Arc<JamBroker> {
        &self.broker
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([header::LOCATION])
}
