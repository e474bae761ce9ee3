//! Review context types.

use serde::{Deserialize, Serialize};

/// Textual snapshot of the repository (or a subdirectory of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub content: String,
    /// Token estimate reported by the packer.
    pub token_count: usize,
    /// Set when the snapshot is degraded (e.g. the artifact was missing).
    pub warning: Option<String>,
}

/// Diff between the base branch and `HEAD`.
///
/// `diff_text` holds a placeholder when there are no changes or git is
/// unavailable. Only the latter carries a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub diff_text: String,
    pub warning: Option<String>,
}

/// The final prompt sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    /// User-turn text: repository, changes, query, optional documents.
    pub text: String,
    /// Reviewer instructions matching the parts present in `text`.
    pub system_prompt: String,
    pub has_documents: bool,
    pub estimated_context_tokens: usize,
}
