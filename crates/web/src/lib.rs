//! Browser chat UI and JSON API for the Teller support agent.
//!
//! One static page talks to a small axum API. Each browser holds a signed
//! session token; sessions own their agent and chat history while the
//! knowledge base is shared.

pub mod error;
mod page;
pub mod routes;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use session::{SessionStore, TokenSigner, WELCOME_MESSAGE};
pub use state::{AppState, Features};

use std::time::Duration;
use teller_core::{AppError, AppResult};
use tower_http::trace::TraceLayer;

/// How often idle sessions are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Bind `host:port` and serve until Ctrl-C.
pub async fn serve(state: AppState, host: &str, port: u16) -> AppResult<()> {
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = sessions.sweep() {
                tracing::warn!("Session sweep failed: {}", e);
            }
        }
    });

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Teller listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
