//! Audit runner: one `axe.run` invocation, one terminal outcome.

use super::{AuditReport, BRANDING_APPLICATION, RULE_TAGS};
use crate::error::{AuditError, AuditResult, Stage};
use crate::renderer::RenderContext;
use serde_json::json;
use std::time::Duration;

/// Build the script that configures the engine and runs it against the
/// environment's document. The callback is adapted into a promise so the
/// evaluation resolves with exactly one of results or error.
pub fn run_script() -> String {
    let configure = json!({
        "branding": { "application": BRANDING_APPLICATION },
        "noHtml": false,
    });
    let options = json!({
        "runOnly": { "type": "tag", "values": RULE_TAGS },
    });

    format!(
        r#"(() => new Promise((resolve, reject) => {{
  axe.configure({configure});
  axe.run(document, {options}, (err, results) => {{
    if (err) {{
      reject(err instanceof Error ? err : new Error(String(err)));
    }} else {{
      resolve(results);
    }}
  }});
}}))()"#
    )
}

/// Run the engine in a ready environment, bounded by `timeout`.
pub async fn run(ctx: &dyn RenderContext, timeout: Duration) -> AuditResult<AuditReport> {
    let script = run_script();
    match tokio::time::timeout(timeout, ctx.execute_js(&script)).await {
        Err(_) => Err(AuditError::Timeout {
            stage: Stage::Audit,
            after_ms: timeout.as_millis() as u64,
        }),
        Ok(Err(e)) => Err(AuditError::EngineRun(format!("{e:#}"))),
        Ok(Ok(value)) => AuditReport::from_value(value),
    }
}
