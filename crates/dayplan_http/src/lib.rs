//! HTTP surface for the day plan core.
//!
//! # Responsibility
//! - Translate HTTP requests into `dayplan_core` service calls.
//! - Map domain errors to status codes and `{error, details?}` bodies.
//!
//! # Invariants
//! - Handlers never touch SQLite directly; all work runs through
//!   [`AppState::with_service`] on the blocking pool.
//! - The caller identity comes only from the `x-user-id` header.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

use dayplan_core::open_db;
use log::{info, warn};

/// Opens the database, binds the listener and serves until shutdown.
pub async fn serve(config: &ServerConfig) -> Result<(), String> {
    let conn = open_db(&config.db_path).map_err(|err| {
        format!(
            "failed to open database `{}`: {err}",
            config.db_path.display()
        )
    })?;
    let app = router(AppState::new(conn));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|err| format!("failed to bind `{}`: {err}", config.bind_addr))?;
    info!(
        "event=server_start module=http status=ok bind_addr={} db_path={}",
        config.bind_addr,
        config.db_path.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| format!("server error: {err}"))?;
    info!("event=server_stop module=http status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("event=shutdown_signal module=http status=error error={err}");
        std::future::pending::<()>().await;
    }
}
