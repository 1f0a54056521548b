//! Management API.
//!
//! # Data Flow
//! ```text
//! operator (breaker-cli, curl)
//!     → auth.rs (bearer token)
//!     → handlers.rs (read snapshots, open/close/reset)
//!     → registry.rs (lookup by composite name)
//!     → CircuitBreaker public operations
//! ```

pub mod auth;
pub mod handlers;
pub mod registry;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::schema::AdminConfig;
pub use self::registry::{composite_name, BreakerRegistry, BreakerSnapshot, RegistryError};

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: BreakerRegistry,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(registry: BreakerRegistry, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            api_key: api_key.into(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breakers", get(list_breakers))
        .route("/admin/breakers/{name}", get(get_breaker))
        .route("/admin/breakers/{name}/open", post(open_breaker))
        .route("/admin/breakers/{name}/close", post(close_breaker))
        .route("/admin/breakers/{name}/reset-stats", post(reset_statistics))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the management API until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AdminState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}

/// Serve the management API described by `config` until `shutdown` resolves.
///
/// Returns at once when the API is disabled.
pub async fn serve_from_config<F>(
    config: &AdminConfig,
    registry: BreakerRegistry,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if !config.enabled {
        tracing::debug!("Admin API disabled");
        return Ok(());
    }

    let listener = TcpListener::bind(config.bind_address.as_str()).await?;
    serve(listener, AdminState::new(registry, config.api_key.as_str()), shutdown).await
}
