//! graphload HTTP server
//!
//! Thin axum layer over [`graphload::service::UploadService`]: multipart
//! uploads, job status polling, manual completion and a server-sent event
//! stream of job progress.

pub mod cli;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use error::{Result, ServerError, StartupError};
pub use state::AppState;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use graphload::config::Config;
use tokio::net::TcpListener;
use tracing::info;

/// How long in-flight synchronous uploads may run after the listener stops.
const BLOCKING_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GraphloadServer {
    state: Arc<AppState>,
    router: Router,
}

impl GraphloadServer {
    pub fn new(state: Arc<AppState>) -> Self {
        let router = routes::build_router(Arc::clone(&state));
        Self { state, router }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serves until `shutdown` resolves, then lets open requests finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(
            addr = %listener.local_addr()?,
            workers = self.state.config.worker_count,
            queue_capacity = self.state.config.queue_capacity(),
            "graphload server listening"
        );
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Runs the server until Ctrl-C or SIGTERM, then stops the workers.
///
/// The state is built before the async runtime starts: the Virtuoso client
/// is blocking and must not be created or dropped inside it.
pub fn run_server(config: Config) -> std::result::Result<(), StartupError> {
    let state = Arc::new(AppState::from_config(config)?);
    let result_logger = state::spawn_result_logger(state.service.pool().results())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on({
        let state = Arc::clone(&state);
        async move {
            let listener = TcpListener::bind(state.config.server.bind.as_str()).await?;
            GraphloadServer::new(state).serve(listener, shutdown_signal()).await
        }
    });
    runtime.shutdown_timeout(BLOCKING_DRAIN_TIMEOUT);

    AppState::shutdown(state);
    if result_logger.join().is_err() {
        tracing::error!("result logger panicked");
    }
    info!("graphload server stopped");
    served.map_err(StartupError::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("failed to listen for SIGTERM: {}", e);
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
    info!("shutdown signal received");
}
