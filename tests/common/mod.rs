//! Shared utilities for integration tests.
#![allow(dead_code)]

use circuit_guard::admin::{self, AdminState, BreakerRegistry};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A failure the guarded operation reports.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("service unavailable")]
pub struct Unavailable;

/// Base error meant to be ignored by classifiers.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("validation failed")]
pub struct Validation;

/// An error caused by a `Validation`, standing in for a subtype of it.
#[derive(Debug, Error)]
#[error("field rejected")]
pub struct FieldRejected {
    #[source]
    pub source: Validation,
}

pub const API_KEY: &str = "test-admin-key";

/// Start the admin API on an ephemeral port.
///
/// Returns the bound address and a sender that stops the server.
pub async fn start_admin(registry: BreakerRegistry) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown = async move {
            let _ = stop_rx.await;
        };
        let _ = admin::serve(listener, AdminState::new(registry, API_KEY), shutdown).await;
    });

    (addr, stop_tx)
}
