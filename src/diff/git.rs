//! Git CLI wrapper for producing diffs.
//!
//! Shells out to `git` via `tokio::process::Command`.

use std::path::{Path, PathBuf};

use super::DiffError;

/// Run `git diff <base>...HEAD` and return the unified diff output.
///
/// The three-dot form compares `HEAD` against the merge base, so commits
/// that landed on `base` after branching do not show up. A `base` starting
/// with `-` would be parsed by git as an option and is rejected.
pub async fn three_dot_diff(repo_root: &Path, base: &str) -> Result<String, DiffError> {
    if base.is_empty() || base.starts_with('-') {
        return Err(DiffError::GitError(format!("invalid base ref: '{base}'")));
    }
    let range = format!("{base}...HEAD");
    let output = tokio::process::Command::new("git")
        .args(["diff", range.as_str(), "--"])
        .current_dir(repo_root)
        .output()
        .await
        .map_err(|e| DiffError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DiffError::GitError(format!(
            "git diff failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| DiffError::GitError(format!("git output is not valid UTF-8: {e}")))
}

/// Find the root of the git repository containing `start_dir`.
pub async fn find_repo_root(start_dir: &Path) -> Result<PathBuf, DiffError> {
    let output = tokio::process::Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(start_dir)
        .output()
        .await
        .map_err(|e| DiffError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DiffError::GitError(format!(
            "not a git repository: {}",
            stderr.trim()
        )));
    }

    Ok(PathBuf::from(
        String::from_utf8_lossy(&output.stdout).trim(),
    ))
}
