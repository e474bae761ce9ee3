//! Clap argument types.

use clap::Parser;
use std::path::PathBuf;

use revdiff::constants::DEFAULT_BASE_BRANCH;
use revdiff::models::ReviewRequest;

/// Review branch changes with an LLM, using the whole repository as context.
#[derive(Parser, Debug)]
#[command(name = "revdiff", version = revdiff::constants::VERSION)]
pub struct Cli {
    /// Disable anonymous usage telemetry.
    #[arg(long, global = true, default_value_t = false)]
    pub no_telemetry: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Whether verbose diagnostics were requested.
    pub fn debug(&self) -> bool {
        match &self.command {
            Command::Review(args) => args.debug,
            Command::Providers(args) => args.debug,
            Command::Version => false,
        }
    }
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Review the changes on the current branch.
    Review(Box<ReviewArgs>),

    /// Show which providers have credentials configured.
    Providers(ProvidersArgs),

    /// Print version information.
    Version,
}

/// Arguments for the `providers` subcommand.
#[derive(Parser, Debug)]
pub struct ProvidersArgs {
    /// Print the table as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, default_value_t = false, hide = true)]
    pub debug: bool,
}

/// Arguments for the `review` subcommand.
#[derive(Parser, Debug)]
pub struct ReviewArgs {
    /// What the reviewer should focus on.
    pub query: String,

    /// Branch to compare `HEAD` against.
    #[arg(long, default_value = DEFAULT_BASE_BRANCH)]
    pub base: String,

    /// Only pack this subdirectory into the repository context.
    #[arg(long)]
    pub subdir: Option<PathBuf>,

    /// URL of a document to add as context. Repeatable.
    #[arg(long = "with-doc", value_name = "URL")]
    pub with_doc: Vec<String>,

    /// Use only this provider (no fallback).
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name, overriding config and provider defaults.
    #[arg(long)]
    pub model: Option<String>,

    /// Completion token budget.
    #[arg(long)]
    pub max_tokens: Option<u64>,

    /// Verbose diagnostics and detailed error output.
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Working directory (default: current directory).
    #[arg(long, default_value = ".")]
    pub path: PathBuf,
}

impl ReviewArgs {
    /// Convert the parsed flags into a pipeline request.
    pub fn to_request(&self) -> ReviewRequest {
        let mut request = ReviewRequest::new(self.query.clone())
            .with_base(self.base.clone())
            .with_documents(self.with_doc.iter().cloned())
            .with_debug(self.debug);
        if let Some(subdir) = &self.subdir {
            request = request.with_subdirectory(subdir.clone());
        }
        if let Some(provider) = &self.provider {
            request = request.with_provider(provider.clone());
        }
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}
