//! HTTP document fetcher with lightweight HTML-to-text reduction.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::{DocumentFetcher, FetchError};
use crate::identity::AppIdentity;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("static pattern compiles")
}

static SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?is)<(script|style|noscript|head)\b[^>]*>.*?</(script|style|noscript|head)\s*>")
});
static COMMENT: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?s)<!--.*?-->"));
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)</?(p|div|br|li|ul|ol|h[1-6]|tr|table|section|article|pre|blockquote)\b[^>]*>")
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"<[^>]+>"));
static INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| pattern(r"[ \t\r\f]+"));
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| pattern(r"\n\s*\n+"));

/// [`DocumentFetcher`] over plain HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpDocumentFetcher {
    user_agent: String,
}

impl HttpDocumentFetcher {
    pub fn new(identity: &AppIdentity) -> Self {
        Self {
            user_agent: identity.user_agent(),
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str, debug: bool) -> Result<String, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        if debug {
            tracing::debug!(url, bytes = body.len(), is_html, "fetched document");
        }

        Ok(if is_html || looks_like_html(&body) {
            html_to_text(&body)
        } else {
            body
        })
    }
}

fn looks_like_html(body: &str) -> bool {
    let lower: String = body
        .trim_start()
        .chars()
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    lower.starts_with("<!doctype html") || lower.starts_with("<html")
}

/// Reduce an HTML page to readable text.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_STYLE.replace_all(html, "");
    let text = COMMENT.replace_all(&text, "");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = INLINE_SPACE.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    // `&amp;` last so `&amp;lt;` stays `&lt;`.
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
