//! The vendored accessibility engine (axe-core) and how it is driven.
//!
//! The engine script is read from disk once at startup and shared
//! read-only by every request. Each audit injects it into its own fresh
//! DOM environment: [`loader`] makes `axe.run` callable, [`runner`]
//! invokes it with the fixed rule configuration.

pub mod loader;
pub mod report;
pub mod runner;

pub use report::AuditReport;

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Rule tags evaluated by every audit.
pub const RULE_TAGS: &[&str] = &["wcag2a", "wcag2aa", "wcag21a", "wcag21aa", "best-practice"];

/// Application name reported in the engine's branding.
pub const BRANDING_APPLICATION: &str = "a11ycat";

/// Immutable engine source text.
#[derive(Clone)]
pub struct EngineSource {
    text: Arc<str>,
}

impl EngineSource {
    /// Read the engine script from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read axe-core source: {}", path.display()))?;
        if text.trim().is_empty() {
            bail!("axe-core source is empty: {}", path.display());
        }
        if !text.contains("axe") {
            tracing::warn!(
                path = %path.display(),
                "engine source does not mention `axe`; audits will likely fail to load"
            );
        }
        Ok(Self::from_text(text))
    }

    pub fn from_text(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl std::fmt::Debug for EngineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSource")
            .field("bytes", &self.text.len())
            .finish()
    }
}
