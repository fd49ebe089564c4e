//! Start the audit HTTP service.

use crate::config::ServiceConfig;
use crate::engine::EngineSource;
use crate::pipeline::Auditor;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{NoopRenderer, Renderer};
use crate::rest;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Load the engine, launch the browser and serve until ctrl-c.
pub async fn run(config: ServiceConfig) -> Result<()> {
    config.validate()?;
    info!("starting litterbox v{}", env!("CARGO_PKG_VERSION"));

    let engine = EngineSource::load(&config.axe_path)
        .context("cannot serve audits without the axe-core source")?;
    info!(
        path = %config.axe_path.display(),
        bytes = engine.len(),
        "axe-core source loaded"
    );

    let renderer: Arc<dyn Renderer> =
        match ChromiumRenderer::launch(config.chromium_path.as_deref()).await {
            Ok(renderer) => {
                info!("Chromium renderer initialized");
                Arc::new(renderer)
            }
            Err(e) => {
                warn!("Failed to initialize Chromium: {e:#}");
                warn!("Audits will fail until a browser is available");
                Arc::new(NoopRenderer)
            }
        };

    let auditor = Arc::new(Auditor::new(Arc::clone(&renderer), engine, &config));
    info!(
        max_concurrent_audits = config.max_concurrent_audits,
        fetch_timeout_ms = config.timeouts.fetch.as_millis() as u64,
        audit_timeout_ms = config.timeouts.audit.as_millis() as u64,
        "audit pipeline ready"
    );

    let result = rest::start(config.socket_addr(), auditor).await;
    renderer.shutdown().await?;
    info!("litterbox stopped");
    result
}
