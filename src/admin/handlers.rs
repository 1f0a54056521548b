use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admin::registry::BreakerSnapshot;
use crate::admin::AdminState;
use crate::resilience::errors::ListenerError;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub breakers: usize,
}

/// Errors returned by the management API.
#[derive(Debug)]
pub enum AdminError {
    NotFound(String),
    /// The transition happened but the listener failed.
    Listener(ListenerError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminError::NotFound(name) => (
                StatusCode::NOT_FOUND,
                format!("circuit breaker '{}' not found", name),
            ),
            AdminError::Listener(e) => {
                tracing::error!(error = %e, "Listener failed during admin action");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<ListenerError> for AdminError {
    fn from(e: ListenerError) -> Self {
        AdminError::Listener(e)
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        breakers: state.registry.len(),
    })
}

pub async fn list_breakers(State(state): State<AdminState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.registry.snapshots())
}

pub async fn get_breaker(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, AdminError> {
    let breaker = state.registry.get(&name).ok_or(AdminError::NotFound(name))?;
    Ok(Json(BreakerSnapshot::capture(&breaker)))
}

pub async fn open_breaker(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, AdminError> {
    let breaker = state.registry.get(&name).ok_or(AdminError::NotFound(name))?;
    tracing::warn!(breaker = %breaker.name(), "Forcing circuit breaker open via admin API");
    breaker.open()?;
    Ok(Json(BreakerSnapshot::capture(&breaker)))
}

pub async fn close_breaker(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, AdminError> {
    let breaker = state.registry.get(&name).ok_or(AdminError::NotFound(name))?;
    tracing::info!(breaker = %breaker.name(), "Closing circuit breaker via admin API");
    breaker.close()?;
    Ok(Json(BreakerSnapshot::capture(&breaker)))
}

pub async fn reset_statistics(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, AdminError> {
    let breaker = state.registry.get(&name).ok_or(AdminError::NotFound(name))?;
    breaker.reset_statistics();
    Ok(Json(BreakerSnapshot::capture(&breaker)))
}
