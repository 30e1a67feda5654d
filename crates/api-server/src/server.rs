//! Server creation and management utilities
//!
//! Builds the router and runs it either in the background (returning a
//! handle) or in the foreground until ctrl-c.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use common::config::Config;
use oauth::MemorySessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use crate::guard;
use crate::routes;
use crate::state::AppState;

/// How often idle in-memory sessions are swept
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(600);

/// Create the Axum router with all routes configured
pub fn create_router(state: AppState) -> Router {
    // Everything that talks to Drive needs a signed-in session
    let drive_routes = Router::new()
        .route("/upload", get(routes::upload_form).post(routes::upload))
        .route("/download/{file_id}", get(routes::download))
        .route("/delete/{file_id}", post(routes::delete))
        .route("/share/{file_id}", get(routes::share_form).post(routes::share))
        .layer(DefaultBodyLimit::max(state.config.drive.max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_login,
        ));

    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/authorize", get(routes::authorize))
        .route("/oauth2callback", get(routes::oauth2callback))
        .route("/logout", get(routes::logout))
        .merge(drive_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Server handle that can be used to shut down the server
pub struct ServerHandle {
    shutdown_tx: oneshot::Sender<()>,
    addr: SocketAddr,
}

impl ServerHandle {
    /// Address the server is bound to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal the server to shut down gracefully
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn spawn_session_purge(store: Arc<MemorySessionStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            store.purge_idle().await;
        }
    });
}

async fn bind(config: &Config) -> anyhow::Result<(TcpListener, SocketAddr)> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

fn build_app(config: Config) -> anyhow::Result<Router> {
    let state = AppState::new(config)?;
    if let Some(store) = &state.memory_store {
        spawn_session_purge(store.clone());
    }
    Ok(create_router(state))
}

/// Start the server in a background task, returning a handle for shutdown
pub async fn start_server(config: Config) -> anyhow::Result<ServerHandle> {
    let (listener, addr) = bind(&config).await?;
    let app = build_app(config)?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Received shutdown signal");
            })
            .await
            .ok();
    });

    tracing::info!("Server started on {}", addr);

    Ok(ServerHandle { shutdown_tx, addr })
}

/// Start the server and block until ctrl-c (for CLI usage)
pub async fn run_server_blocking(config: Config) -> anyhow::Result<()> {
    let (listener, addr) = bind(&config).await?;
    let app = build_app(config)?;

    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
