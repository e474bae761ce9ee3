//! The review request handed to the pipeline.

use std::path::PathBuf;

use crate::constants::DEFAULT_BASE_BRANCH;

/// A single "review changes" invocation.
///
/// Built once by the caller and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    /// Free-text review instructions from the user.
    pub query: String,
    /// Branch the working tree is compared against.
    pub base_branch: String,
    /// Restrict the snapshot to this directory (relative to the working dir).
    pub subdirectory: Option<PathBuf>,
    /// Extra documents to fetch and append, in order.
    pub document_urls: Vec<String>,
    /// Pin a provider by name. Disables fallback.
    pub provider_override: Option<String>,
    pub model_override: Option<String>,
    pub max_tokens: Option<u64>,
    pub debug: bool,
}

impl ReviewRequest {
    /// Create a request for `query` against the default base branch.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
            subdirectory: None,
            document_urls: Vec::new(),
            provider_override: None,
            model_override: None,
            max_tokens: None,
            debug: false,
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base_branch = base.into();
        self
    }

    pub fn with_subdirectory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.subdirectory = Some(dir.into());
        self
    }

    pub fn with_documents(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.document_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider_override = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
