// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald serve` command implementation.
//!
//! Wires the shared service clients, the supervisor, and the gateway, then
//! runs the supervision loop until SIGTERM/SIGINT. Dependency order: store
//! and provider clients first, then the supervised pipeline, then the
//! health surface.

use std::sync::Arc;

use tracing::{info, warn};

use herald_config::model::HeraldConfig;
use herald_core::HeraldError;
use herald_gateway::HeraldGateway;
use herald_prometheus::PrometheusAdapter;
use herald_provider::HttpDeliveryProvider;
use herald_store::SqliteRecordStore;
use herald_supervisor::{install_signal_handler, ServiceHandles, Supervisor};

/// Initialize the tracing subscriber from the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Run the `herald serve` command.
pub async fn run_serve(config: HeraldConfig) -> Result<(), HeraldError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting herald serve");

    // Store first: an unreachable database is an unrecoverable startup
    // failure and must fail fast.
    let store = Arc::new(SqliteRecordStore::new(config.storage.clone()));
    store.initialize().await?;

    // Provider client; it doubles as the workflow catalog.
    let provider = Arc::new(HttpDeliveryProvider::new(&config.provider)?);
    if config.provider.api_key.is_none() {
        warn!("provider.api_key is not set; requests will be unauthenticated");
    }

    // Prometheus recorder (optional): delivery continues without metrics.
    let prometheus_adapter = if config.prometheus.enabled {
        match PrometheusAdapter::new() {
            Ok(adapter) => {
                info!("prometheus metrics enabled");
                Some(adapter)
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        None
    };
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        prometheus_adapter.as_ref().map(|adapter| {
            let handle = adapter.handle().clone();
            Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });

    let handles = ServiceHandles {
        store: store.clone(),
        provider: provider.clone(),
        catalog: provider.clone(),
    };
    let supervisor = Supervisor::new(config.clone(), handles);

    let shutdown = install_signal_handler();

    // Health and control surface, exposed once the pipeline exists.
    let gateway = if config.gateway.enabled {
        let gateway = Arc::new(HeraldGateway::new(
            config.gateway.clone(),
            supervisor.clone(),
            prometheus_render,
        ));
        let addr = gateway.start().await?;
        info!(%addr, "gateway started");
        Some(gateway)
    } else {
        info!("gateway disabled by configuration");
        None
    };

    // The supervision loop runs (and periodically recycles) the pipeline
    // until the shutdown token fires.
    let result = supervisor.run(shutdown).await;

    if let Some(gateway) = gateway {
        if let Err(e) = herald_core::Component::shutdown(gateway.as_ref()).await {
            warn!(error = %e, "gateway shutdown error");
        }
    }

    info!("herald serve exited");
    result
}
