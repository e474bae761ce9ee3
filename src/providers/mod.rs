//! Model provider trait and LLM integration.
//!
//! Provides an abstraction layer over rig-core to decouple the
//! pipeline from the specific LLM library, plus the availability
//! registry that drives provider selection and fallback.

pub mod registry;
pub mod rig;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ProviderId;

pub use registry::{ProviderDescriptor, ProviderRegistry};

/// Errors from a model provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub model: String,
    pub max_tokens: u64,
    pub system_prompt: String,
    pub prompt: String,
    pub debug: bool,
}

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A completed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
    /// `None` when the provider does not expose usage.
    pub usage: Option<TokenUsage>,
}

/// Trait for an LLM that can answer one prompt.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError>;
}

/// Builds a [`ModelProvider`] for a provider identifier.
///
/// Construction failures (e.g. a client that rejects its credentials) are
/// treated like invocation failures and participate in fallback.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, provider: ProviderId) -> Result<Box<dyn ModelProvider>, ProviderError>;
}
