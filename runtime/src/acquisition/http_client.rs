//! Async HTTP client wrapping reqwest.
//!
//! Fetches the raw HTML of the page under audit. Not a browser — just one
//! GET with a redirect limit, a total timeout and a body size cap. There are
//! no retries: every failure is terminal for the audit.

use crate::error::{AuditError, AuditResult, Stage};
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36 litterbox";

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Requested URL, normalised.
    pub url: Url,
    /// Final URL after redirects.
    pub final_url: Url,
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Content-Type header, if the server sent one.
    pub content_type: Option<String>,
    /// Response body decoded as UTF-8. Invalid sequences, including
    /// text in another declared charset, become U+FFFD.
    pub body: String,
}

/// HTTP client for the fetch stage.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpClient {
    /// Create a client whose requests are bounded by `timeout` in total.
    pub fn new(timeout: Duration, max_body_bytes: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            timeout,
            max_body_bytes,
        }
    }

    /// GET `url` and return its body as text.
    pub async fn fetch(&self, url: &str) -> AuditResult<FetchedPage> {
        let target = parse_target(url)?;

        let mut resp = self
            .client
            .get(target.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuditError::Fetch(format!(
                "{target} responded with status {}",
                status.as_u16()
            )));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        if let Some(ct) = &content_type {
            if !is_textual(ct) {
                return Err(AuditError::Fetch(format!("non-text body ({ct})")));
            }
        }

        if let Some(len) = resp.content_length() {
            if len > self.max_body_bytes as u64 {
                return Err(self.too_large());
            }
        }

        let final_url = resp.url().clone();
        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.classify(e))? {
            if bytes.len() + chunk.len() > self.max_body_bytes {
                return Err(self.too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            url: target,
            final_url,
            status: status.as_u16(),
            content_type,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    fn classify(&self, err: reqwest::Error) -> AuditError {
        if err.is_timeout() {
            return AuditError::Timeout {
                stage: Stage::Fetch,
                after_ms: self.timeout.as_millis() as u64,
            };
        }
        AuditError::Fetch(error_chain(&err))
    }

    fn too_large(&self) -> AuditError {
        AuditError::Fetch(format!(
            "body exceeds the {} byte limit",
            self.max_body_bytes
        ))
    }
}

/// Parse and restrict the audit target to http(s).
pub fn parse_target(url: &str) -> AuditResult<Url> {
    let parsed =
        Url::parse(url.trim()).map_err(|e| AuditError::Fetch(format!("invalid URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(AuditError::Fetch(format!("unsupported URL scheme '{other}'"))),
    }
}

/// Whether a Content-Type denotes markup or text we can hand to the parser.
fn is_textual(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/xml"
        || mime.ends_with("+xml")
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !msg.contains(&cause_msg) {
            msg.push_str(": ");
            msg.push_str(&cause_msg);
        }
        source = cause.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(Duration::from_secs(5), 1024)
    }

    #[test]
    fn test_parse_target_rejects_other_schemes() {
        assert!(parse_target("https://example.com/a").is_ok());
        assert!(matches!(
            parse_target("file:///etc/passwd"),
            Err(AuditError::Fetch(_))
        ));
        assert!(matches!(parse_target("not a url"), Err(AuditError::Fetch(_))));
    }

    #[test]
    fn test_is_textual() {
        assert!(is_textual("text/html; charset=utf-8"));
        assert!(is_textual("application/xhtml+xml"));
        assert!(is_textual("image/svg+xml"));
        assert!(!is_textual("application/pdf"));
        assert!(!is_textual("image/png"));
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<p>hi</p>", "text/html"),
            )
            .mount(&server)
            .await;

        let page = client()
            .fetch(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<p>hi</p>");
        assert_eq!(page.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_fetch_decodes_other_charsets_lossily() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                b"<p lang=\"fr\">caf\xe9</p>".to_vec(),
                "text/html; charset=windows-1252",
            ))
            .mount(&server)
            .await;

        let page = client().fetch(&server.uri()).await.unwrap();
        assert_eq!(page.body, "<p lang=\"fr\">caf\u{fffd}</p>");
        assert_eq!(
            page.content_type.as_deref(),
            Some("text/html; charset=windows-1252")
        );
    }

    #[tokio::test]
    async fn test_fetch_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client().fetch(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("404"), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_rejects_binary_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(vec![0u8, 1, 2], "application/octet-stream"),
            )
            .mount(&server)
            .await;

        let err = client().fetch(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("non-text body"), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("x".repeat(4096), "text/html"),
            )
            .mount(&server)
            .await;

        let err = client().fetch(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("byte limit"), "{err}");
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let slow = HttpClient::new(Duration::from_millis(50), 1024);
        let err = slow.fetch(&server.uri()).await.unwrap_err();
        assert!(
            matches!(
                err,
                AuditError::Timeout {
                    stage: Stage::Fetch,
                    ..
                }
            ),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let err = client().fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, AuditError::Fetch(_)), "{err}");
    }
}
