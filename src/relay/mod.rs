mod handlers;
mod sse;

use crate::config::RelayConfig;
use crate::providers::ProviderRegistry;
use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Shared by every handler. The registry never changes after startup.
#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ProviderRegistry>,
    next_session: Arc<AtomicU64>,
    keep_alive: Duration,
}

impl AppState {
    fn next_session_id(&self) -> u64 {
        self.next_session.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// HTTP-level knobs that sit around the routes.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Empty allows any origin.
    pub allowed_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
    /// Interval between SSE keep-alive comments.
    pub keep_alive: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            static_dir: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }
}

impl From<&RelayConfig> for HttpOptions {
    fn from(config: &RelayConfig) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            static_dir: config.static_dir.clone(),
            ..Self::default()
        }
    }
}

pub fn build_router(registry: ProviderRegistry, options: &HttpOptions) -> Router {
    let state = AppState {
        registry: Arc::new(registry),
        next_session: Arc::new(AtomicU64::new(0)),
        keep_alive: options.keep_alive,
    };

    let mut router = Router::new()
        .route("/", get(handlers::discovery))
        .route("/api/:model", post(handlers::stream_prompt));
    if let Some(dir) = &options.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(cors_layer(&options.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(origin = %origin, %error, "ignoring unusable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// A bound listener plus the router it will serve.
pub struct RelayServer {
    listener: TcpListener,
    router: Router,
}

impl RelayServer {
    pub async fn bind(addr: SocketAddr, router: Router) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind relay to {addr}"))?;
        Ok(Self { listener, router })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("relay listener has no local address")
    }

    /// Serves until `shutdown` resolves, then lets open responses finish.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        tracing::info!("relay listening on http://{addr}");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("relay server failed")?;
        tracing::info!("relay stopped");
        Ok(())
    }

    pub async fn run(self) -> Result<()> {
        self.run_with_shutdown(std::future::pending()).await
    }
}
