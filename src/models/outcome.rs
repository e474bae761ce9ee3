//! Successful invocation result.

use serde::Serialize;

use super::ProviderId;

/// What the provider that finally answered produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationOutcome {
    pub provider: ProviderId,
    pub model: String,
    pub response_text: String,
    /// Present only when the provider reported usage.
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}
