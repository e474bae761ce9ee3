//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags (applied by the pipeline from the request)
//! 2. Environment variables
//! 3. `.revdiff.toml` in the working root
//! 4. `~/.config/revdiff/config.toml` (global defaults)
//! 5. Built-in defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env::Env;
use crate::models::ProviderId;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub repo: RepoConfig,
    /// Keyed by provider identifier (`[providers.openai]`).
    pub providers: BTreeMap<String, ProviderSettings>,
    pub snapshot: SnapshotConfig,
    pub telemetry: TelemetryConfig,
}

/// Task-level settings for the review workflow.
///
/// `provider` stays a plain string so an unknown name can be reported as a
/// configuration error at review time, alongside the supported names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u64>,
}

/// Per-provider overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub model: Option<String>,
    pub max_tokens: Option<u64>,
    /// Custom endpoint for OpenAI-style providers.
    pub base_url: Option<String>,
}

/// Per-file size limit when nothing is configured.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Repository packing overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Extra gitignore-style patterns to leave out of the snapshot.
    pub ignore: Vec<String>,
    /// Files larger than this are skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_bytes: Option<u64>,
}

impl SnapshotConfig {
    /// The effective per-file size limit.
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes.unwrap_or(DEFAULT_MAX_FILE_BYTES)
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Collector that receives JSON events. Nothing is sent without one.
    pub endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, repo-local config, then applies
    /// environment variable overrides.
    pub fn load(repo_root: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: repo-local config
        if let Some(root) = repo_root {
            let local_path = root.join(crate::constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Settings for one provider, if the config has a section for it.
    pub fn provider(&self, id: ProviderId) -> Option<&ProviderSettings> {
        self.providers.get(id.as_str())
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (values set in `other` win).
    fn merge(&mut self, other: Config) {
        if other.repo.provider.is_some() {
            self.repo.provider = other.repo.provider;
        }
        if other.repo.model.is_some() {
            self.repo.model = other.repo.model;
        }
        if other.repo.max_tokens.is_some() {
            self.repo.max_tokens = other.repo.max_tokens;
        }

        for (id, settings) in other.providers {
            let entry = self.providers.entry(id).or_default();
            if settings.model.is_some() {
                entry.model = settings.model;
            }
            if settings.max_tokens.is_some() {
                entry.max_tokens = settings.max_tokens;
            }
            if settings.base_url.is_some() {
                entry.base_url = settings.base_url;
            }
        }

        if !other.snapshot.ignore.is_empty() {
            self.snapshot.ignore.extend(other.snapshot.ignore);
        }
        if other.snapshot.max_file_bytes.is_some() {
            self.snapshot.max_file_bytes = other.snapshot.max_file_bytes;
        }

        // Telemetry settings (disabled overrides enabled)
        if !other.telemetry.enabled {
            self.telemetry.enabled = false;
        }
        if other.telemetry.endpoint.is_some() {
            self.telemetry.endpoint = other.telemetry.endpoint;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        use crate::constants::{ENV_MAX_TOKENS, ENV_MODEL, ENV_PROVIDER, ENV_TELEMETRY};

        if let Some(val) = env.non_empty(ENV_PROVIDER) {
            self.repo.provider = Some(val);
        }
        if let Some(val) = env.non_empty(ENV_MODEL) {
            self.repo.model = Some(val);
        }
        if let Some(val) = env.non_empty(ENV_MAX_TOKENS) {
            match val.trim().parse::<u64>() {
                Ok(n) => self.repo.max_tokens = Some(n),
                Err(_) => tracing::warn!("ignoring invalid {ENV_MAX_TOKENS} value: {val}"),
            }
        }

        if let Some(val) = env.non_empty(ENV_TELEMETRY) {
            match val.to_lowercase().as_str() {
                "false" | "0" | "no" | "off" => self.telemetry.enabled = false,
                "true" | "1" | "yes" | "on" => self.telemetry.enabled = true,
                _ => tracing::warn!("ignoring invalid {ENV_TELEMETRY} value: {val}"),
            }
        }
    }
}
