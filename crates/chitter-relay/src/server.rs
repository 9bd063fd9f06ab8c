// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay HTTP server built on axum.
//!
//! Routes:
//! - `GET /ws` WebSocket upgrade (auth via query params)
//! - `GET /health` liveness and online count
//! - `GET /metrics` Prometheus text, when a renderer is configured

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chitter_core::ChitterError;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenVerifier;
use crate::hub::Hub;
use crate::ws;

/// Renders the Prometheus exposition text.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// State for the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Instant,
    pub prometheus_render: Option<MetricsRender>,
}

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct RelayState {
    pub hub: Arc<Hub>,
    pub verifier: TokenVerifier,
    /// Per-connection outbound queue bound.
    pub outbound_queue: usize,
    pub health: HealthState,
    /// Cancelled on shutdown; open sockets close when it fires.
    pub cancel: CancellationToken,
}

impl RelayState {
    pub fn new(
        verifier: TokenVerifier,
        outbound_queue: usize,
        prometheus_render: Option<MetricsRender>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            hub: Arc::new(Hub::new()),
            verifier,
            outbound_queue: outbound_queue.max(1),
            health: HealthState {
                start_time: Instant::now(),
                prometheus_render,
            },
            cancel,
        }
    }
}

/// Relay bind configuration (mirrors `RelayConfig` from chitter-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub online: usize,
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ChitterError> {
    let addr = config.addr();
    TcpListener::bind(&addr).await.map_err(|e| ChitterError::Relay {
        message: format!("failed to bind relay to {addr}: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Serve until `state.cancel` fires.
pub async fn serve(listener: TcpListener, state: RelayState) -> Result<(), ChitterError> {
    if state.verifier.is_open() {
        tracing::warn!("relay has no auth secret configured, accepting any user id");
    }
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("relay listening on {addr}");
    }

    let cancel = state.cancel.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| ChitterError::Relay {
            message: format!("relay server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("relay stopped");
    Ok(())
}

async fn get_health(State(state): State<RelayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        online: state.hub.presence_count(),
    })
}

async fn get_metrics(State(state): State<RelayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_state_is_clone() {
        let state = RelayState::new(TokenVerifier::open(), 0, None, CancellationToken::new());
        let cloned = state.clone();
        assert_eq!(cloned.outbound_queue, 1);
        assert!(Arc::ptr_eq(&state.hub, &cloned.hub));
    }

    #[test]
    fn server_config_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3030,
        };
        assert_eq!(config.addr(), "127.0.0.1:3030");
        assert!(format!("{config:?}").contains("3030"));
    }

    #[tokio::test]
    async fn health_reports_online_users() {
        let state = RelayState::new(TokenVerifier::open(), 4, None, CancellationToken::new());
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        state.hub.connect("alice".into(), tx);
        let Json(health) = get_health(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.online, 1);
    }

    #[tokio::test]
    async fn metrics_missing_without_renderer() {
        let state = RelayState::new(TokenVerifier::open(), 4, None, CancellationToken::new());
        let response = get_metrics(State(state)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
