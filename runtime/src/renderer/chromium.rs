//! Chromium-based renderer using chromiumoxide.
//!
//! Every context gets its own incognito browser context, so cookies,
//! storage and the document itself never cross requests. The engine is
//! evaluated in an isolated world: it sees the page's DOM but none of the
//! page's global bindings.

use super::{ReleaseGuard, RenderContext, Renderer};
use crate::dom::DomDocument;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CreateIsolatedWorldParams;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the isolated world the engine runs in.
const WORLD_NAME: &str = "litterbox-audit";

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    // 2. LITTERBOX_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("LITTERBOX_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 3. ~/.litterbox/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".litterbox/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".litterbox/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".litterbox/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".litterbox/chromium/chrome-linux64/chrome"),
                home.join(".litterbox/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 4. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 5. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Arc<Browser>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch(explicit_path: Option<&Path>) -> Result<Self> {
        let chrome_path = find_chromium(explicit_path)
            .context("Chromium not found. Set LITTERBOX_CHROMIUM_PATH or install Chrome.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {e}");
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    async fn open_page(
        &self,
        context_id: &BrowserContextId,
        document: &DomDocument,
    ) -> Result<(Page, ExecutionContextId)> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|e| anyhow!("invalid target params: {e}"))?;

        let page = self
            .browser
            .new_page(target)
            .await
            .context("failed to create new page")?;

        page.set_content(document.html())
            .await
            .context("failed to load document")?;

        let frame_id = page
            .mainframe()
            .await
            .context("failed to resolve main frame")?
            .context("page has no main frame")?;

        let world = page
            .execute(
                CreateIsolatedWorldParams::builder()
                    .frame_id(frame_id)
                    .world_name(WORLD_NAME)
                    .build()
                    .map_err(|e| anyhow!("invalid isolated world params: {e}"))?,
            )
            .await
            .context("failed to create isolated world")?;

        Ok((page, world.result.execution_context_id.clone()))
    }

}

async fn dispose(browser: &Browser, context_id: BrowserContextId) {
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        warn!("failed to dispose browser context: {e}");
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self, document: &DomDocument) -> Result<Box<dyn RenderContext>> {
        let created = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("failed to create browser context")?;
        let context_id = created.result.browser_context_id.clone();

        // `set_content` can stall on sub-resources; if the caller's timeout
        // drops this future, the guard still disposes the browser context.
        let guard = {
            let browser = Arc::clone(&self.browser);
            let context_id = context_id.clone();
            ReleaseGuard::new(async move { dispose(&browser, context_id).await })
        };

        let (page, world) = match self.open_page(&context_id, document).await {
            Ok(opened) => opened,
            Err(e) => {
                guard.release().await;
                return Err(e);
            }
        };
        guard.disarm();

        self.active_count.fetch_add(1, Ordering::Relaxed);
        debug!(url = %document.url(), "opened DOM environment");

        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            context_id,
            page,
            world,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped when ChromiumRenderer is dropped
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// One incognito browser context with one page.
pub struct ChromiumContext {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    page: Page,
    world: ExecutionContextId,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .context_id(self.world.clone())
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow!("invalid evaluate params: {e}"))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("JS execution failed")?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        if let Err(e) = self.page.close().await {
            debug!("page close failed: {e}");
        }
        self.browser
            .execute(DisposeBrowserContextParams::new(self.context_id))
            .await
            .context("failed to dispose browser context")?;
        Ok(())
    }
}
