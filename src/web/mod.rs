//! Web layer
//!
//! A thin dispatcher in front of the [`JobOrchestrator`]: handlers extract
//! the caller identity and request body, delegate, and map the result through
//! [`responses::handle_error`]. No scheduling logic lives here.

use anyhow::Result;
use axum::{
    Router,
    routing::{get, patch, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{config::Config, database::Database, job_scheduling::JobOrchestrator};

pub mod extractors;
pub mod handlers;
pub mod responses;
pub mod utils;

pub use responses::{ApiResponse, handle_error};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
    pub database: Database,
    /// Application start time for uptime calculation
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<JobOrchestrator>, database: Database) -> Self {
        Self {
            orchestrator,
            database,
            start_time: chrono::Utc::now(),
        }
    }
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, state: AppState) -> Result<Self> {
        let addr: SocketAddr = config.bind_address().parse()?;
        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    /// Serve until `shutdown` is cancelled or a termination signal arrives
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.addr, e))?;
        info!("Listening on http://{}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Create the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/jobs",
            get(handlers::jobs::list_jobs).post(handlers::jobs::create_job),
        )
        .route(
            "/jobs/{id}",
            get(handlers::jobs::get_job)
                .put(handlers::jobs::update_job)
                .delete(handlers::jobs::delete_job),
        )
        .route("/jobs/{id}/toggle", patch(handlers::jobs::toggle_job))
        .route("/jobs/{id}/run", post(handlers::jobs::run_job))
        .route(
            "/jobs/{id}/executions",
            get(handlers::jobs::list_executions),
        )
        .route("/stats/jobs", get(handlers::jobs::job_stats))
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
        _ = shutdown.cancelled() => info!("Shutdown requested, stopping web server"),
    }
}
