//! Repository snapshot construction.
//!
//! The packer writes its artifact to a fixed path; the builder then reads it
//! back. A packer failure is fatal, while a missing artifact only degrades
//! the review to an empty snapshot with a warning.

pub mod packer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::SnapshotConfig;
use crate::constants::SNAPSHOT_FILENAME;
use crate::error::ReviewError;
use crate::models::RepoSnapshot;

pub use packer::{IgnorePacker, PackError, PackOptions, PackSummary, RepoPacker};

/// Patterns always left out of the snapshot.
const DEFAULT_EXCLUDES: &[&str] = &[
    SNAPSHOT_FILENAME,
    "node_modules/",
    "target/",
    "dist/",
    "*.min.js",
    "*.min.css",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "Cargo.lock",
];

/// Warning attached when the packer reported success but produced nothing.
pub const MISSING_ARTIFACT_WARNING: &str = "Warning: Snapshot output file not found after pack operation. Repository context may be missing.";

impl PackOptions {
    /// Options for a run rooted at `working_dir`.
    pub fn from_config(working_dir: &Path, config: &SnapshotConfig) -> Self {
        let mut ignore_patterns: Vec<String> =
            DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        ignore_patterns.extend(config.ignore.iter().cloned());
        Self {
            output_path: working_dir.join(SNAPSHOT_FILENAME),
            ignore_patterns,
            max_file_bytes: config.max_file_bytes(),
        }
    }
}

/// Builds a [`RepoSnapshot`] for one directory.
pub struct SnapshotBuilder {
    packer: Arc<dyn RepoPacker>,
    options: PackOptions,
}

impl SnapshotBuilder {
    pub fn new(packer: Arc<dyn RepoPacker>, options: PackOptions) -> Self {
        Self { packer, options }
    }

    pub fn artifact_path(&self) -> &Path {
        &self.options.output_path
    }

    pub async fn build(&self, directory: &Path) -> Result<RepoSnapshot, ReviewError> {
        if !tokio::fs::metadata(directory)
            .await
            .is_ok_and(|m| m.is_dir())
        {
            return Err(ReviewError::DirectoryNotFound {
                path: PathBuf::from(directory),
            });
        }

        let summary = self
            .packer
            .pack(directory, &self.options)
            .await
            .map_err(|e| ReviewError::file("Failed to pack repository", e))?;

        let artifact = self.artifact_path();
        if !tokio::fs::try_exists(artifact).await.unwrap_or(false) {
            tracing::warn!(path = %artifact.display(), "snapshot artifact missing after pack");
            if let Err(e) = tokio::fs::write(artifact, "").await {
                tracing::warn!(error = %e, "could not create empty snapshot artifact");
            }
            return Ok(RepoSnapshot {
                content: String::new(),
                token_count: 0,
                warning: Some(MISSING_ARTIFACT_WARNING.to_string()),
            });
        }

        let content = tokio::fs::read_to_string(artifact)
            .await
            .map_err(|e| ReviewError::file("Failed to read repository context", e))?;

        Ok(RepoSnapshot {
            content,
            token_count: summary.total_tokens,
            warning: None,
        })
    }
}
