//! Script-free re-serialization of a parsed document.
//!
//! Walks the `scraper` tree and writes HTML back out, dropping every
//! construct that could execute code from the untrusted page.

use scraper::{ElementRef, Html, Node};
use std::fmt::Write as _;
use url::Url;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// HTML elements whose text content is written verbatim. In SVG or MathML
/// the same names hold ordinary, entity-decoded text.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Page-level policy; isolated-world evaluation is not subject to it.
pub const CONTENT_SECURITY_POLICY: &str = "script-src 'none'; object-src 'none'";

/// Attributes that carry a navigable URL.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction", "xlink:href"];

/// Output of [`sanitize`].
pub struct Sanitized {
    pub html: String,
    /// Number of elements and attributes removed.
    pub neutralized: usize,
}

/// Serialize `doc` without scripts, bound to `base` for relative URLs.
pub fn sanitize(doc: &Html, base: &Url, has_base: bool) -> Sanitized {
    let mut writer = Writer {
        out: String::new(),
        neutralized: 0,
        head_seen: false,
        base: if has_base { None } else { Some(base.as_str()) },
    };

    for child in doc.tree.root().children() {
        match child.value() {
            Node::Doctype(doctype) => {
                let _ = write!(writer.out, "<!DOCTYPE {}>", doctype.name());
            }
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    writer.element(el);
                }
            }
            _ => {}
        }
    }

    Sanitized {
        html: writer.out,
        neutralized: writer.neutralized,
    }
}

struct Writer<'a> {
    out: String,
    neutralized: usize,
    head_seen: bool,
    /// Pending `<base href>` to insert into `<head>`.
    base: Option<&'a str>,
}

impl Writer<'_> {
    fn element(&mut self, el: ElementRef<'_>) {
        let element = el.value();
        let name = element.name();

        if name == "script" || is_meta_refresh(el) {
            self.neutralized += 1;
            return;
        }

        self.out.push('<');
        self.out.push_str(name);
        for (attr, value) in element.attrs() {
            if is_dangerous_attribute(name, attr, value) {
                self.neutralized += 1;
                continue;
            }
            self.out.push(' ');
            self.out.push_str(attr);
            self.out.push_str("=\"");
            escape_into(&mut self.out, value, true);
            self.out.push('"');
        }
        self.out.push('>');

        if name == "head" && !self.head_seen {
            self.head_seen = true;
            if let Some(href) = self.base.take() {
                self.out.push_str("<base href=\"");
                escape_into(&mut self.out, href, true);
                self.out.push_str("\">");
            }
            let _ = write!(
                self.out,
                "<meta http-equiv=\"Content-Security-Policy\" content=\"{CONTENT_SECURITY_POLICY}\">"
            );
        }

        if VOID_ELEMENTS.contains(&name) {
            return;
        }

        let raw = RAW_TEXT_ELEMENTS.contains(&name) && &*element.name.ns == HTML_NAMESPACE;
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    if raw {
                        self.out.push_str(text);
                    } else {
                        escape_into(&mut self.out, text, false);
                    }
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el);
                    }
                }
                _ => {}
            }
        }

        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }
}

fn is_meta_refresh(el: ElementRef<'_>) -> bool {
    el.value().name() == "meta"
        && el
            .value()
            .attr("http-equiv")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
}

fn is_dangerous_attribute(element: &str, attr: &str, value: &str) -> bool {
    let attr_lower = attr.to_ascii_lowercase();

    if attr_lower.starts_with("on") {
        return true;
    }

    // Nested documents would load and run outside this sanitizer.
    let frame_source = match element {
        "iframe" | "frame" => attr_lower == "src" || attr_lower == "srcdoc",
        "object" => attr_lower == "data",
        "embed" => attr_lower == "src",
        _ => false,
    };
    if frame_source {
        return true;
    }

    URL_ATTRIBUTES.contains(&attr_lower.as_str()) && is_javascript_url(value)
}

/// Browsers strip ASCII whitespace and controls before reading the scheme.
fn is_javascript_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .take("javascript:".len())
        .collect();
    compact.eq_ignore_ascii_case("javascript:")
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
