//! `litterbox audit <url>` — run a single audit and print the report.

use crate::config::ServiceConfig;
use crate::engine::EngineSource;
use crate::error::FailureEnvelope;
use crate::pipeline::Auditor;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use anyhow::{bail, Context, Result};
use std::sync::Arc;

/// Run the audit command. The report (or the failure envelope) goes to
/// stdout; a failed audit is an error so the process exits non-zero.
pub async fn run(url: &str, config: ServiceConfig, pretty: bool) -> Result<()> {
    let engine = EngineSource::load(&config.axe_path)?;
    let renderer: Arc<dyn Renderer> = Arc::new(
        ChromiumRenderer::launch(config.chromium_path.as_deref())
            .await
            .context("the audit command needs a local Chromium")?,
    );
    let auditor = Auditor::new(Arc::clone(&renderer), engine, &config);

    let outcome = auditor.audit(url).await;
    renderer.shutdown().await?;

    match outcome {
        Ok(report) => {
            print_json(report.as_value(), pretty)?;
            Ok(())
        }
        Err(e) => {
            let envelope = FailureEnvelope::new(&e);
            print_json(&serde_json::to_value(&envelope)?, pretty)?;
            bail!("{e}")
        }
    }
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
