//! Engine loader: make `axe.run` callable inside a DOM environment.
//!
//! The engine source is evaluated directly in the environment's isolated
//! execution context. Completion of that evaluation normally implies
//! readiness, but readiness is still established explicitly: the probe is
//! polled against a deadline before the runner is allowed to proceed.

use super::EngineSource;
use crate::error::{AuditError, AuditResult};
use crate::renderer::RenderContext;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// True once the engine's entry point exists.
pub const READY_PROBE: &str =
    "typeof axe === 'object' && axe !== null && typeof axe.run === 'function'";

/// No-op stand-ins for facilities the engine expects but the environment
/// may lack. Existing implementations are left alone.
pub const CAPABILITY_SHIMS: &str = r#"(() => {
  if (typeof window.MutationObserver === 'undefined') {
    window.MutationObserver = class MutationObserver {
      constructor(callback) { this.callback = callback; }
      observe() {}
      disconnect() {}
      takeRecords() { return []; }
    };
  }
  return true;
})()"#;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Inject the engine and wait until its entry point is callable.
pub async fn load(
    ctx: &dyn RenderContext,
    source: &EngineSource,
    timeout: Duration,
) -> AuditResult<()> {
    ctx.execute_js(CAPABILITY_SHIMS)
        .await
        .map_err(|e| AuditError::EngineLoad(format!("capability shims: {e:#}")))?;

    // Trailing `true` keeps the completion value serializable whatever the
    // script's last statement is.
    let script = format!("{}\n;true", source.as_str());
    ctx.execute_js(&script)
        .await
        .map_err(|e| AuditError::EngineLoad(format!("{e:#}")))?;

    wait_until_ready(ctx, timeout).await
}

/// Poll [`READY_PROBE`] until it holds or `timeout` elapses.
pub async fn wait_until_ready(ctx: &dyn RenderContext, timeout: Duration) -> AuditResult<()> {
    let deadline = Instant::now() + timeout;
    let mut probes = 0u32;

    loop {
        probes += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, ctx.execute_js(READY_PROBE)).await {
            Ok(Ok(Value::Bool(true))) => {
                debug!(probes, "engine ready");
                return Ok(());
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("readiness probe failed: {e:#}"),
            Err(_) => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(AuditError::EngineLoad(format!(
                "axe.run not available after {}ms ({probes} probes)",
                timeout.as_millis()
            )));
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}
