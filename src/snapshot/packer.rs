//! Default repository packer.
//!
//! Walks the tree with the `ignore` crate (so `.gitignore` rules and hidden
//! files are honoured) and writes one plain-text document: a directory
//! listing followed by every file under a `File: <path>` banner.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use thiserror::Error;

use crate::constants::CHARS_PER_TOKEN;

/// Errors from a packer.
#[derive(Error, Debug)]
pub enum PackError {
    #[error("I/O error while packing: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] ignore::Error),

    #[error("pack task failed: {0}")]
    Task(String),
}

/// What the packer needs to know about one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOptions {
    /// Where the snapshot document is written.
    pub output_path: PathBuf,
    /// Gitignore-style patterns excluded from the snapshot.
    pub ignore_patterns: Vec<String>,
    pub max_file_bytes: u64,
}

/// Counts reported after a successful pack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub total_files: usize,
    pub total_tokens: usize,
}

/// Turns a directory into a single text artifact at `options.output_path`.
#[async_trait]
pub trait RepoPacker: Send + Sync {
    async fn pack(&self, directory: &Path, options: &PackOptions)
    -> Result<PackSummary, PackError>;
}

/// [`RepoPacker`] backed by gitignore-aware traversal.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnorePacker;

#[async_trait]
impl RepoPacker for IgnorePacker {
    async fn pack(
        &self,
        directory: &Path,
        options: &PackOptions,
    ) -> Result<PackSummary, PackError> {
        let root = directory.to_path_buf();
        let options = options.clone();

        // The walk is synchronous, keep it off the runtime threads.
        let (document, summary) =
            tokio::task::spawn_blocking(move || render_document(&root, &options))
                .await
                .map_err(|e| PackError::Task(e.to_string()))??;

        tokio::fs::write(&document.output_path, &document.text).await?;

        tracing::debug!(
            files = summary.total_files,
            tokens = summary.total_tokens,
            output = %document.output_path.display(),
            "packed repository"
        );
        Ok(summary)
    }
}

struct RenderedDocument {
    output_path: PathBuf,
    text: String,
}

fn render_document(
    root: &Path,
    options: &PackOptions,
) -> Result<(RenderedDocument, PackSummary), PackError> {
    let mut overrides = OverrideBuilder::new(root);
    for pattern in &options.ignore_patterns {
        overrides.add(&format!("!{pattern}"))?;
    }
    let overrides = overrides.build()?;

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .overrides(overrides)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut files: Vec<(String, String)> = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_none_or(|ft| !ft.is_file()) {
            continue;
        }
        if entry.path() == options.output_path {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            if metadata.len() > options.max_file_bytes {
                tracing::debug!(path = %entry.path().display(), "skipping large file");
                continue;
            }
        }
        // Binary and otherwise unreadable files are left out.
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .display()
            .to_string();
        files.push((relative, content));
    }

    let mut text = String::new();
    let _ = writeln!(
        text,
        "This file is a merged representation of {}.\n",
        root.display()
    );
    text.push_str("Directory Structure\n================\n");
    for (path, _) in &files {
        let _ = writeln!(text, "{path}");
    }
    for (path, content) in &files {
        let _ = write!(text, "\n================\nFile: {path}\n================\n{content}");
        if !content.ends_with('\n') {
            text.push('\n');
        }
    }

    let summary = PackSummary {
        total_files: files.len(),
        total_tokens: text.chars().count() / CHARS_PER_TOKEN,
    };
    Ok((
        RenderedDocument {
            output_path: options.output_path.clone(),
            text,
        },
        summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(dir: &Path, ignore: &[&str]) -> PackOptions {
        PackOptions {
            output_path: dir.join("out.txt"),
            ignore_patterns: ignore.iter().map(|s| s.to_string()).collect(),
            max_file_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn packs_files_under_banners() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join("src")).unwrap();
        std::fs::write(repo.join("src/lib.rs"), "pub fn a() {}\n").unwrap();
        std::fs::write(repo.join("README.md"), "hello").unwrap();

        let opts = options(dir.path(), &[]);
        let summary = IgnorePacker.pack(&repo, &opts).await.unwrap();
        assert_eq!(summary.total_files, 2);

        let text = std::fs::read_to_string(&opts.output_path).unwrap();
        assert!(text.contains("Directory Structure\n================\nREADME.md\nsrc/lib.rs\n"));
        assert!(text.contains("File: src/lib.rs\n================\npub fn a() {}\n"));
        assert!(text.contains("File: README.md\n================\nhello\n"));
        assert_eq!(summary.total_tokens, text.chars().count() / 4);
    }

    #[tokio::test]
    async fn respects_gitignore_hidden_and_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join("node_modules/pkg")).unwrap();
        std::fs::write(repo.join(".gitignore"), "secret.txt\n").unwrap();
        std::fs::write(repo.join("secret.txt"), "nope").unwrap();
        std::fs::write(repo.join(".hidden"), "nope").unwrap();
        std::fs::write(repo.join("node_modules/pkg/index.js"), "nope").unwrap();
        std::fs::write(repo.join("keep.rs"), "yes").unwrap();

        let opts = options(dir.path(), &["node_modules/"]);
        let summary = IgnorePacker.pack(&repo, &opts).await.unwrap();
        assert_eq!(summary.total_files, 1);
        let text = std::fs::read_to_string(&opts.output_path).unwrap();
        assert!(text.contains("File: keep.rs"));
        assert!(!text.contains("nope"));
    }

    #[tokio::test]
    async fn skips_large_and_binary_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(repo.join("big.txt"), "x".repeat(4096)).unwrap();
        std::fs::write(repo.join("blob.bin"), [0xff_u8, 0xfe, 0x00, 0x81]).unwrap();
        std::fs::write(repo.join("small.txt"), "ok").unwrap();

        let opts = options(dir.path(), &[]);
        let summary = IgnorePacker.pack(&repo, &opts).await.unwrap();
        assert_eq!(summary.total_files, 1);
    }

    #[tokio::test]
    async fn invalid_pattern_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), &["a{"]);
        let err = IgnorePacker.pack(dir.path(), &opts).await.unwrap_err();
        assert!(matches!(err, PackError::Pattern(_)), "got: {err}");
    }
}
