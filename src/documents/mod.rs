//! Best-effort document context from `--with-doc` URLs.
//!
//! Each URL is fetched in order, one at a time. Failures are reported as
//! warning lines and skipped; the review always continues.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::constants::DOCUMENT_SEPARATOR;
use crate::progress::EventSink;

pub use http::HttpDocumentFetcher;

/// Errors from a document fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{0}")]
    Extraction(String),
}

/// Fetches one document and returns its extracted text.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, debug: bool) -> Result<String, FetchError>;
}

/// Sequential, fault-tolerant fetch over a list of URLs.
pub struct DocumentContextFetcher<'a> {
    fetcher: &'a dyn DocumentFetcher,
}

impl<'a> DocumentContextFetcher<'a> {
    pub fn new(fetcher: &'a dyn DocumentFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch every URL and join the usable texts with the document separator.
    ///
    /// Returns an empty string when nothing usable came back. An empty URL
    /// list produces no events at all.
    pub async fn fetch_all(&self, urls: &[String], debug: bool, events: &EventSink) -> String {
        if urls.is_empty() {
            return String::new();
        }

        events.progress(format!(
            "Fetching and extracting text from {} document(s)...",
            urls.len()
        ));

        let mut contents = Vec::new();
        for url in urls {
            if url.trim().is_empty() {
                events.warning(format!(
                    "Warning: Invalid URL provided in --with-doc: \"{url}\". Skipping."
                ));
                continue;
            }

            events.progress(format!("Fetching from: {url}..."));
            match self.fetcher.fetch(url, debug).await {
                Ok(text) if !text.trim().is_empty() => {
                    contents.push(text);
                    events.progress(format!("Successfully extracted content from: {url}"));
                }
                Ok(_) => events.warning(format!(
                    "Warning: Empty or whitespace-only text returned for {url}. Skipping."
                )),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "document fetch failed");
                    events.warning(format!(
                        "Error during document fetch/extraction for {url}: {e}. Skipping this document."
                    ));
                }
            }
        }

        if contents.is_empty() {
            events.warning(
                "Warning: No content successfully extracted from any provided --with-doc URLs. Proceeding without document context.",
            );
            return String::new();
        }

        events.progress(format!(
            "Successfully added content from {} document(s) to the context.",
            contents.len()
        ));
        contents.join(DOCUMENT_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ReviewEvent, drain_ready};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<&'static str, Result<&'static str, &'static str>>);

    #[async_trait]
    impl DocumentFetcher for MapFetcher {
        async fn fetch(&self, url: &str, _: bool) -> Result<String, FetchError> {
            match self.0.get(url) {
                Some(Ok(text)) => Ok(text.to_string()),
                Some(Err(e)) => Err(FetchError::Extraction(e.to_string())),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn lines(events: Vec<ReviewEvent>) -> Vec<String> {
        events
            .into_iter()
            .map(|e| match e {
                ReviewEvent::Progress(s) | ReviewEvent::Warning(s) => s,
                other => panic!("unexpected event: {other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_list_is_silent() {
        let fetcher = MapFetcher(HashMap::new());
        let (sink, mut rx) = EventSink::channel();
        let docs = DocumentContextFetcher::new(&fetcher)
            .fetch_all(&[], false, &sink)
            .await;
        assert_eq!(docs, "");
        assert!(drain_ready(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn mixed_results_keep_order_and_skip_failures() {
        let fetcher = MapFetcher(HashMap::from([
            ("https://a", Ok("alpha")),
            ("https://b", Ok("   ")),
            ("https://c", Err("parse failed")),
            ("https://d", Ok("delta")),
        ]));
        let urls: Vec<String> = ["https://a", " ", "https://b", "https://c", "https://d"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (sink, mut rx) = EventSink::channel();
        let docs = DocumentContextFetcher::new(&fetcher)
            .fetch_all(&urls, false, &sink)
            .await;

        assert_eq!(docs, "alpha\n\n---\n\ndelta");
        assert_eq!(
            lines(drain_ready(&mut rx)),
            [
                "Fetching and extracting text from 5 document(s)...",
                "Fetching from: https://a...",
                "Successfully extracted content from: https://a",
                "Warning: Invalid URL provided in --with-doc: \" \". Skipping.",
                "Fetching from: https://b...",
                "Warning: Empty or whitespace-only text returned for https://b. Skipping.",
                "Fetching from: https://c...",
                "Error during document fetch/extraction for https://c: parse failed. Skipping this document.",
                "Fetching from: https://d...",
                "Successfully extracted content from: https://d",
                "Successfully added content from 2 document(s) to the context.",
            ]
        );
    }

    #[tokio::test]
    async fn nothing_usable_warns_and_returns_empty() {
        let fetcher = MapFetcher(HashMap::new());
        let (sink, mut rx) = EventSink::channel();
        let docs = DocumentContextFetcher::new(&fetcher)
            .fetch_all(&["https://missing".to_string()], false, &sink)
            .await;
        assert_eq!(docs, "");
        let events = drain_ready(&mut rx);
        assert!(matches!(
            events.last(),
            Some(ReviewEvent::Warning(s)) if s.starts_with("Warning: No content successfully extracted")
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            ReviewEvent::Warning(s) if s.contains("https://missing returned HTTP 404")
        )));
    }
}
