//! DOM builder: turns fetched HTML into a script-free document.
//!
//! Pages are loaded with scripts disabled. Instead of trusting a switch in
//! the browser alone, the markup itself is re-serialized without scripts,
//! inline handlers, `javascript:` URLs, meta refreshes and nested frame
//! sources. A `<base href>` pointing at the source URL keeps relative
//! stylesheets and images resolvable once the document is loaded into a
//! blank page.

mod sanitize;

use crate::error::{AuditError, AuditResult};
use scraper::{Html, Selector};
use url::Url;

/// A sanitized document ready to be loaded into a DOM environment.
#[derive(Debug, Clone)]
pub struct DomDocument {
    url: Url,
    html: String,
    neutralized: usize,
}

impl DomDocument {
    /// Parse `html` and rebuild it without executable content.
    pub fn build(html: &str, url: &Url) -> AuditResult<Self> {
        let parsed = Html::parse_document(html);

        let base_selector = Selector::parse("base[href]")
            .map_err(|e| AuditError::Environment(format!("selector error: {e:?}")))?;
        let has_base = parsed.select(&base_selector).next().is_some();

        let out = sanitize::sanitize(&parsed, url, has_base);
        if out.html.is_empty() {
            return Err(AuditError::Environment(
                "document has no root element".into(),
            ));
        }

        Ok(Self {
            url: url.clone(),
            html: out.html,
            neutralized: out.neutralized,
        })
    }

    /// Source URL the document was fetched from.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sanitized markup.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Count of scripts, handlers and frame sources that were removed.
    pub fn neutralized(&self) -> usize {
        self.neutralized
    }
}
