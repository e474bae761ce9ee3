//! revdiff: review branch changes with an LLM.
//!
//! Re-exports public modules for integration tests and external use.

pub mod config;
pub mod constants;
pub mod diff;
pub mod documents;
pub mod env;
pub mod error;
pub mod identity;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod prompt;
pub mod providers;
pub mod snapshot;
pub mod telemetry;
