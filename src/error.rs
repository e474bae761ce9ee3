//! Review error taxonomy.
//!
//! Every fatal condition the pipeline can hit is a [`ReviewError`]. Degraded
//! inputs (missing diff, failed document, missing snapshot artifact) are not
//! errors at all; they become warning events and the review continues.

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::ProviderId;
use crate::providers::ProviderError;

/// Boxed collaborator error.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Broad class of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing provider/model/credential setup. Never retried.
    Configuration,
    /// Filesystem problems (target directory, snapshot artifact).
    Resource,
    /// Provider calls failed.
    Provider,
}

/// One failed provider attempt during fallback.
#[derive(Debug)]
pub struct FailedAttempt {
    pub provider: ProviderId,
    pub error: ProviderError,
}

/// Fatal review errors.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Unrecognized provider: {name}.")]
    UnknownProvider { name: String },

    #[error("Provider {provider} is not available. Please check your API key configuration.")]
    ProviderUnavailable {
        provider: ProviderId,
        available: Vec<ProviderId>,
    },

    #[error(
        "No suitable AI provider available for review. Please set at least one of: {}.",
        .credentials.join(", ")
    )]
    NoProviderAvailable { credentials: Vec<&'static str> },

    #[error("No model specified for {provider}")]
    NoModel { provider: ProviderId },

    #[error("The directory \"{}\" does not exist.", .path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("{message}")]
    File {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("{provider} failed: {source}")]
    PinnedProviderFailed {
        provider: ProviderId,
        #[source]
        source: ProviderError,
    },

    #[error("No provider succeeded after {} attempt(s).", .attempts.len())]
    AllProvidersFailed { attempts: Vec<FailedAttempt> },
}

impl ReviewError {
    /// Wrap a lower-level I/O or packing failure as a resource error.
    pub fn file(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ReviewError::File {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::UnknownProvider { .. }
            | ReviewError::ProviderUnavailable { .. }
            | ReviewError::NoProviderAvailable { .. }
            | ReviewError::NoModel { .. } => ErrorKind::Configuration,
            ReviewError::DirectoryNotFound { .. } | ReviewError::File { .. } => {
                ErrorKind::Resource
            }
            ReviewError::PinnedProviderFailed { .. } | ReviewError::AllProvidersFailed { .. } => {
                ErrorKind::Provider
            }
        }
    }

    /// Short follow-up advice shown under the message, if any.
    pub fn hint(&self) -> Option<String> {
        match self {
            ReviewError::UnknownProvider { .. } => {
                let names: Vec<_> = ProviderId::ALL.iter().map(|p| p.as_str()).collect();
                Some(format!("Try one of {}", names.join(", ")))
            }
            ReviewError::ProviderUnavailable { available, .. } if !available.is_empty() => {
                let names: Vec<_> = available.iter().map(|p| p.as_str()).collect();
                Some(format!("Try one of {}", names.join(", ")))
            }
            ReviewError::ProviderUnavailable { provider, .. } => Some(format!(
                "Set {} to enable it.",
                crate::providers::registry::credentials(*provider).join(", ")
            )),
            ReviewError::AllProvidersFailed { attempts } => {
                let tried: Vec<_> = attempts.iter().map(|a| a.provider.as_str()).collect();
                Some(format!("Tried: {}", tried.join(", ")))
            }
            _ => None,
        }
    }

    /// Render a single user-facing message.
    ///
    /// With `debug`, the source chain and each failed attempt are appended.
    pub fn format_user_message(&self, debug: bool) -> String {
        let label = match self.kind() {
            ErrorKind::Configuration | ErrorKind::Provider => "Provider error",
            ErrorKind::Resource => "File error",
        };
        let mut message = format!("{label}: {self}");
        if let Some(hint) = self.hint() {
            let _ = write!(message, "\n{hint}");
        }
        if debug {
            if let ReviewError::AllProvidersFailed { attempts } = self {
                for attempt in attempts {
                    let _ = write!(message, "\n  {}: {}", attempt.provider, attempt.error);
                }
            }
            // The pinned provider's error is already part of the message.
            let mut source = match self {
                ReviewError::PinnedProviderFailed { source, .. } => source.source(),
                _ => self.source(),
            };
            while let Some(cause) = source {
                let _ = write!(message, "\nCaused by: {cause}");
                source = cause.source();
            }
        }
        message.push('\n');
        message
    }
}
