//! Shared types used across all modules.
//!
//! This module defines the request, context and outcome types that flow
//! through the review pipeline, plus the closed set of providers. Other
//! modules import from here rather than reaching into each other's internals.

pub mod context;
pub mod outcome;
pub mod request;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use context::{AssembledPrompt, DiffResult, RepoSnapshot};
pub use outcome::InvocationOutcome;
pub use request::ReviewRequest;

/// Supported LLM provider backends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "openrouter")]
    OpenRouter,
    Perplexity,
    #[serde(rename = "modelbox")]
    ModelBox,
    Anthropic,
    #[serde(rename = "xai")]
    XAI,
}

impl ProviderId {
    /// Every provider, in registry table order.
    pub const ALL: [ProviderId; 7] = [
        ProviderId::Gemini,
        ProviderId::OpenAI,
        ProviderId::OpenRouter,
        ProviderId::Perplexity,
        ProviderId::ModelBox,
        ProviderId::Anthropic,
        ProviderId::XAI,
    ];

    /// Lowercase identifier used on the command line and in config.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAI => "openai",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Perplexity => "perplexity",
            ProviderId::ModelBox => "modelbox",
            ProviderId::Anthropic => "anthropic",
            ProviderId::XAI => "xai",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| {
                let supported: Vec<_> = ProviderId::ALL.iter().map(|p| p.as_str()).collect();
                format!(
                    "unsupported provider: '{}'. Supported: {}",
                    s.trim(),
                    supported.join(", ")
                )
            })
    }
}

/// Task role used to pick a fallback preference order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TaskRole {
    /// Whole-repository analysis (the review workflow).
    #[default]
    Repo,
    /// Document-heavy tasks.
    Doc,
}

impl fmt::Display for TaskRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRole::Repo => write!(f, "repo"),
            TaskRole::Doc => write!(f, "doc"),
        }
    }
}
