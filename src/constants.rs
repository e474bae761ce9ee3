//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and budget thresholds so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "revdiff";

/// Crate version reported by `revdiff version` and in user agents.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local config filename (e.g. `.revdiff.toml` in the working root).
pub const CONFIG_FILENAME: &str = ".revdiff.toml";

/// Directory name under `~/.config/` for global config. Shared across forks.
pub const CONFIG_DIR: &str = "revdiff";

/// Repository snapshot artifact, relative to the working directory.
/// Overwritten on every review.
pub const SNAPSHOT_FILENAME: &str = ".revdiff-output.txt";

/// Base branch used when none is given.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Completion budget used when neither the request nor config sets one.
pub const DEFAULT_MAX_TOKENS: u64 = 8000;

/// Context size (in estimated tokens) above which a review is flagged as large.
pub const LARGE_CONTEXT_TOKENS: usize = 200_000;

/// Rough characters-per-token ratio used for all context estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// Separator placed between fetched documents.
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Base URL for the ModelBox OpenAI-compatible API.
pub const MODELBOX_BASE_URL: &str = "https://api.model.box/v1";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "REVDIFF_PROVIDER";
pub const ENV_MODEL: &str = "REVDIFF_MODEL";
pub const ENV_MAX_TOKENS: &str = "REVDIFF_MAX_TOKENS";
pub const ENV_TELEMETRY: &str = "REVDIFF_TELEMETRY";
pub const ENV_PACKAGE_NAME: &str = "REVDIFF_PACKAGE_NAME";
pub const ENV_PACKAGE_SCOPE: &str = "REVDIFF_PACKAGE_SCOPE";
