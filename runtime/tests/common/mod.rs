//! Shared fixtures: a scripted renderer standing in for Chromium + axe-core.

#![allow(dead_code)]

use async_trait::async_trait;
use litterbox::acquisition::HttpClient;
use litterbox::config::Timeouts;
use litterbox::dom::DomDocument;
use litterbox::engine::loader::{CAPABILITY_SHIMS, READY_PROBE};
use litterbox::engine::EngineSource;
use litterbox::pipeline::Auditor;
use litterbox::renderer::{ReleaseGuard, RenderContext, Renderer};
use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Marker the fake environment recognises as the engine source.
pub const FAKE_AXE: &str = "/* fake axe */ window.axe = { run() {} };";

/// Observations shared by every context a [`ScriptedRenderer`] opens.
#[derive(Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub premature_runs: AtomicUsize,
    pub documents: Mutex<Vec<String>>,
}

/// Behaves like Chromium with axe-core loaded, deriving a tiny report
/// from the document it holds.
pub struct ScriptedRenderer {
    pub ready_after: usize,
    pub run_error: Option<String>,
    pub run_delay: Duration,
    /// Time spent loading the document after the context is allocated.
    pub open_delay: Duration,
    pub counters: Arc<Counters>,
}

impl Default for ScriptedRenderer {
    fn default() -> Self {
        Self {
            ready_after: 1,
            run_error: None,
            run_delay: Duration::ZERO,
            open_delay: Duration::ZERO,
            counters: Arc::new(Counters::default()),
        }
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self, document: &DomDocument) -> anyhow::Result<Box<dyn RenderContext>> {
        let c = &self.counters;
        c.opened.fetch_add(1, Ordering::SeqCst);
        let now = c.active.fetch_add(1, Ordering::SeqCst) + 1;
        c.max_active.fetch_max(now, Ordering::SeqCst);
        c.documents
            .lock()
            .unwrap()
            .push(document.html().to_string());

        let guard = {
            let counters = Arc::clone(&self.counters);
            ReleaseGuard::new(async move {
                counters.closed.fetch_add(1, Ordering::SeqCst);
                counters.active.fetch_sub(1, Ordering::SeqCst);
            })
        };
        tokio::time::sleep(self.open_delay).await;
        guard.disarm();

        Ok(Box::new(ScriptedContext {
            html: document.html().to_string(),
            url: document.url().to_string(),
            ready_after: self.ready_after,
            run_error: self.run_error.clone(),
            run_delay: self.run_delay,
            loaded: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            probes: AtomicUsize::new(0),
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }
}

struct ScriptedContext {
    html: String,
    url: String,
    ready_after: usize,
    run_error: Option<String>,
    run_delay: Duration,
    loaded: AtomicBool,
    ready: AtomicBool,
    probes: AtomicUsize,
    counters: Arc<Counters>,
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn execute_js(&self, script: &str) -> anyhow::Result<Value> {
        if script == CAPABILITY_SHIMS {
            return Ok(Value::Bool(true));
        }
        if script == READY_PROBE {
            let n = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
            let ready = self.loaded.load(Ordering::SeqCst) && n >= self.ready_after;
            if ready {
                self.ready.store(true, Ordering::SeqCst);
            }
            return Ok(Value::Bool(ready));
        }
        if script.contains(FAKE_AXE) {
            self.loaded.store(true, Ordering::SeqCst);
            return Ok(Value::Bool(true));
        }
        if script.contains("axe.run(document") {
            if !self.ready.load(Ordering::SeqCst) {
                self.counters.premature_runs.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("ReferenceError: axe is not defined");
            }
            tokio::time::sleep(self.run_delay).await;
            if let Some(msg) = &self.run_error {
                anyhow::bail!("{msg}");
            }
            return Ok(report_for(&self.html, &self.url));
        }
        anyhow::bail!("unexpected script")
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Two toy rules, enough to tell documents apart.
fn report_for(html: &str, url: &str) -> Value {
    let doc = Html::parse_document(html);
    let rule = |id: &str, selector: &str| {
        let sel = Selector::parse(selector).unwrap();
        let nodes: Vec<Value> = doc
            .select(&sel)
            .map(|el| json!({ "html": el.html() }))
            .collect();
        (id.to_string(), nodes)
    };

    let mut violations = Vec::new();
    let mut passes = Vec::new();
    for (id, nodes) in [rule("image-alt", "img:not([alt])"), rule("html-has-lang", "html:not([lang])")] {
        if nodes.is_empty() {
            passes.push(json!({ "id": id, "nodes": [] }));
        } else {
            violations.push(json!({ "id": id, "nodes": nodes }));
        }
    }

    json!({
        "testEngine": { "name": "axe-core", "version": "test" },
        "url": url,
        "violations": violations,
        "passes": passes,
        "incomplete": [],
        "inapplicable": [],
    })
}

/// Wait for spawned releases to land.
pub async fn settle(counters: &Counters) {
    for _ in 0..100 {
        if counters.active.load(Ordering::SeqCst) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn timeouts() -> Timeouts {
    Timeouts {
        fetch: Duration::from_secs(3),
        engine_load: Duration::from_millis(500),
        audit: Duration::from_secs(3),
    }
}

pub fn auditor_with(renderer: ScriptedRenderer, timeouts: Timeouts, max_concurrent: usize) -> Arc<Auditor> {
    Arc::new(Auditor::with_client(
        HttpClient::new(timeouts.fetch, 1024 * 1024),
        Arc::new(renderer),
        EngineSource::from_text(FAKE_AXE),
        timeouts,
        max_concurrent,
    ))
}

pub fn auditor(renderer: ScriptedRenderer) -> Arc<Auditor> {
    auditor_with(renderer, timeouts(), 4)
}
