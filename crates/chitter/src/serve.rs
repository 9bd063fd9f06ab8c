// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chitter serve`: bring up logging, metrics, and the relay.

use chitter_config::ChitterConfig;
use chitter_core::ChitterError;
use chitter_relay::{MetricsRender, RelayState, ServerConfig, TokenVerifier};
use tracing::info;

use crate::shutdown;

pub async fn run_serve(config: ChitterConfig) -> Result<(), ChitterError> {
    init_tracing(&config.logging.level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting chitter relay");

    let prometheus_render = if config.metrics.enabled {
        install_metrics()?
    } else {
        None
    };

    let cancel = shutdown::install_signal_handler();
    let state = RelayState::new(
        TokenVerifier::new(config.relay.auth_secret.clone()),
        config.relay.outbound_queue,
        prometheus_render,
        cancel,
    );
    let listener = chitter_relay::bind(&ServerConfig {
        host: config.relay.host.clone(),
        port: config.relay.port,
    })
    .await?;

    chitter_relay::serve(listener, state).await
}

#[cfg(feature = "prometheus")]
fn install_metrics() -> Result<Option<MetricsRender>, ChitterError> {
    use std::sync::Arc;

    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ChitterError::Internal(format!("failed to install Prometheus recorder: {e}")))?;
    chitter_relay::metrics::register_metrics();
    info!("prometheus metrics recorder installed");
    Ok(Some(Arc::new(move || handle.render())))
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics() -> Result<Option<MetricsRender>, ChitterError> {
    tracing::warn!("metrics enabled in config but this build has no prometheus support");
    Ok(None)
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chitter={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
