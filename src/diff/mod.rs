//! Change collection against a base branch.
//!
//! Diff problems never abort a review: the collector always yields
//! some text for the prompt, plus a warning when git could not be used.

pub mod git;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::DiffResult;

/// Errors from the diff source.
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("git command failed: {0}")]
    GitError(String),
}

/// Produces the raw diff of `HEAD` against a base ref.
#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn diff_against(&self, base: &str) -> Result<String, DiffError>;
}

/// [`DiffSource`] that runs the `git` binary in a working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }
}

#[async_trait]
impl DiffSource for GitCli {
    async fn diff_against(&self, base: &str) -> Result<String, DiffError> {
        git::three_dot_diff(&self.repo_root, base).await
    }
}

/// Turns a [`DiffSource`] result into prompt-ready [`DiffResult`]s.
pub struct GitDiffCollector<'a> {
    source: &'a dyn DiffSource,
}

impl<'a> GitDiffCollector<'a> {
    pub fn new(source: &'a dyn DiffSource) -> Self {
        Self { source }
    }

    pub async fn diff(&self, base: &str) -> DiffResult {
        match self.source.diff_against(base).await {
            Ok(text) if text.trim().is_empty() => DiffResult {
                diff_text: format!("(No changes from {base})"),
                warning: None,
            },
            Ok(text) => DiffResult {
                diff_text: text,
                warning: None,
            },
            Err(e) => {
                tracing::debug!(error = %e, base, "diff unavailable");
                DiffResult {
                    diff_text: format!(
                        "(Diff unavailable - not a git repository or branch '{base}' not found)"
                    ),
                    warning: Some(format!("Warning: Could not compute diff from {base}: {e}")),
                }
            }
        }
    }
}
