// Copyright 2026 Litterbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! The audit pipeline: fetch → build DOM → load engine → run audit.
//!
//! An [`Auditor`] is shared by all requests. Per request it owns nothing
//! but a semaphore permit and one DOM environment, which is closed on
//! every exit path including stage timeouts.

use crate::acquisition::HttpClient;
use crate::config::{ServiceConfig, Timeouts};
use crate::dom::DomDocument;
use crate::engine::{loader, runner, AuditReport, EngineSource};
use crate::error::{AuditError, AuditResult, Stage};
use crate::renderer::{RenderContext, Renderer};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Reject a missing or blank URL before any work starts.
pub fn validate_url(url: Option<&str>) -> AuditResult<&str> {
    match url.map(str::trim) {
        Some(u) if !u.is_empty() => Ok(u),
        _ => Err(AuditError::MissingUrl),
    }
}

/// Runs audits with bounded concurrency.
pub struct Auditor {
    http: HttpClient,
    renderer: Arc<dyn Renderer>,
    engine: EngineSource,
    timeouts: Timeouts,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Auditor {
    pub fn new(renderer: Arc<dyn Renderer>, engine: EngineSource, config: &ServiceConfig) -> Self {
        let http = HttpClient::new(config.timeouts.fetch, config.max_body_bytes);
        Self::with_client(
            http,
            renderer,
            engine,
            config.timeouts,
            config.max_concurrent_audits,
        )
    }

    pub fn with_client(
        http: HttpClient,
        renderer: Arc<dyn Renderer>,
        engine: EngineSource,
        timeouts: Timeouts,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            http,
            renderer,
            engine,
            timeouts,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Audit one URL end to end.
    pub async fn audit(&self, url: &str) -> AuditResult<AuditReport> {
        let url = validate_url(Some(url))?;
        let started = Instant::now();

        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| AuditError::Unavailable)?;
        debug!(url, waited_ms = started.elapsed().as_millis() as u64, "admitted");

        let page = self.http.fetch(url).await?;
        debug!(url, bytes = page.body.len(), status = page.status, "fetched");

        let document = DomDocument::build(&page.body, &page.final_url)?;
        if document.neutralized() > 0 {
            debug!(url, neutralized = document.neutralized(), "stripped executable content");
        }

        let ctx = self.open(&document).await?;
        let outcome = self.run_engine(ctx.as_ref()).await;
        if let Err(e) = ctx.close().await {
            warn!(url, "failed to release DOM environment: {e:#}");
        }

        let report = outcome?;
        info!(
            url,
            duration_ms = started.elapsed().as_millis() as u64,
            violations = report.count("violations"),
            passes = report.count("passes"),
            "audit complete"
        );
        Ok(report)
    }

    async fn open(&self, document: &DomDocument) -> AuditResult<Box<dyn RenderContext>> {
        let bound = self.timeouts.audit;
        match tokio::time::timeout(bound, self.renderer.new_context(document)).await {
            Ok(Ok(ctx)) => Ok(ctx),
            Ok(Err(e)) => Err(AuditError::Environment(format!("{e:#}"))),
            Err(_) => Err(AuditError::Timeout {
                stage: Stage::Environment,
                after_ms: bound.as_millis() as u64,
            }),
        }
    }

    async fn run_engine(&self, ctx: &dyn RenderContext) -> AuditResult<AuditReport> {
        loader::load(ctx, &self.engine, self.timeouts.engine_load).await?;
        runner::run(ctx, self.timeouts.audit).await
    }

    pub fn renderer_available(&self) -> bool {
        self.renderer.is_available()
    }

    pub fn active_contexts(&self) -> usize {
        self.renderer.active_contexts()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Audits currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.permits.available_permits())
    }

    /// Stop admitting audits; waiting and future requests fail.
    pub fn close(&self) {
        self.permits.close();
    }
}
