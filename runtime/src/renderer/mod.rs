//! Renderer abstraction for request-scoped DOM environments.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). A context
//! holds exactly one sanitized document and one isolated execution context
//! in which the accessibility engine runs.

pub mod chromium;

use crate::dom::DomDocument;
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

/// A browser engine that can open DOM environments.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a fresh environment holding `document`. Nothing is shared with
    /// any other open context.
    ///
    /// Callers bound this with a timeout, so anything allocated before the
    /// returned future completes must be held by a [`ReleaseGuard`].
    async fn new_context(&self, document: &DomDocument) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
    /// Whether contexts can be opened at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// A single DOM environment.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Evaluate `script` in the isolated execution context, awaiting a
    /// returned promise, and return its value as JSON.
    ///
    /// A thrown exception or rejected promise is an error.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Release the environment.
    async fn close(self: Box<Self>) -> Result<()>;
}

type ReleaseFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Releases a half-built environment unless disarmed.
///
/// `new_context` runs under the caller's timeout. If that future is dropped
/// while the guard is armed, the release future is spawned onto the
/// current runtime instead of being lost.
pub struct ReleaseGuard {
    release: Option<ReleaseFuture>,
}

impl ReleaseGuard {
    pub fn new<F>(release: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            release: Some(Box::pin(release)),
        }
    }

    /// Ownership passed to a live context; nothing to release.
    pub fn disarm(mut self) {
        self.release = None;
    }

    /// Release now, in the caller's task.
    pub async fn release(mut self) {
        if let Some(release) = self.release.take() {
            release.await;
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(release);
            }
            Err(_) => warn!("no runtime to release an abandoned environment"),
        }
    }
}

/// A no-op renderer used when Chromium is unavailable.
///
/// The service still starts and answers validation errors; every audit
/// fails at environment construction.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self, _document: &DomDocument) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
    fn is_available(&self) -> bool {
        false
    }
}
