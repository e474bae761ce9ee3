//! revdiff: review branch changes with an LLM.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use revdiff::config;
use revdiff::constants;
use revdiff::diff;
use revdiff::env;
use revdiff::error::ReviewError;
use revdiff::identity::AppIdentity;
use revdiff::orchestrator::ReviewPipeline;
use revdiff::progress::TerminalReporter;
use revdiff::providers::ProviderRegistry;
use revdiff::telemetry::{HttpTelemetry, LogTelemetry, TelemetrySink};

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::args::{Cli, Command, ProvidersArgs, ReviewArgs};
use config::Config;
use env::Env;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let debug = cli.debug();
    init_tracing(debug);

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<ReviewError>() {
            Some(review) => eprint!("{}", review.format_user_message(debug)),
            None => eprintln!("Error: {err:#}"),
        }
        process::exit(1);
    }
}

/// Diagnostics go to stderr; `RUST_LOG` wins over the built-in default.
fn init_tracing(debug: bool) {
    let default = if debug { "revdiff=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let no_telemetry = cli.no_telemetry;

    match cli.command {
        Command::Review(args) => run_review(*args, no_telemetry).await,
        Command::Providers(args) => run_providers(args),
        Command::Version => run_version(),
    }
}

/// Print version information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    let identity = AppIdentity::from_env(&Env::real());
    println!(
        "{} {}",
        identity.full_name().bold(),
        constants::VERSION.green().bold()
    );
    if identity.is_fork() {
        println!("{}  {}", "fork of:".dimmed(), constants::APP_NAME);
    }
    Ok(())
}

/// List providers and whether their credentials are set.
fn run_providers(args: ProvidersArgs) -> Result<()> {
    let registry = ProviderRegistry::new(Env::real());
    let descriptors = registry.descriptors();
    if args.json {
        let json = serde_json::to_string_pretty(&descriptors)
            .context("failed to serialize provider list")?;
        println!("{json}");
    } else {
        print!("{}", cli::render_providers(&descriptors));
    }
    Ok(())
}

async fn run_review(args: ReviewArgs, no_telemetry: bool) -> Result<()> {
    let env = Env::real();
    let identity = AppIdentity::from_env(&env);

    // Resolve the working root from --path (default: cwd)
    let base_dir = std::fs::canonicalize(&args.path)
        .with_context(|| format!("--path directory not found: {}", args.path.display()))?;
    let working_dir = match diff::git::find_repo_root(&base_dir).await {
        Ok(root) => root,
        Err(e) => {
            tracing::debug!(error = %e, "not inside a git repository, using --path as root");
            base_dir.clone()
        }
    };

    // Load config with layering
    let config = Config::load(Some(working_dir.as_path()), &env)
        .context("failed to load configuration")?;

    let telemetry_enabled = config.telemetry.enabled && !no_telemetry;
    let http_telemetry = match (&config.telemetry.endpoint, telemetry_enabled) {
        (Some(endpoint), true) => Some(Arc::new(HttpTelemetry::new(
            endpoint.clone(),
            &identity,
            &env,
        ))),
        _ => None,
    };
    let telemetry: Arc<dyn TelemetrySink> = match &http_telemetry {
        Some(http) => Arc::clone(http) as Arc<dyn TelemetrySink>,
        None => Arc::new(LogTelemetry),
    };

    let request = args.to_request();
    if request.query.trim().is_empty() {
        bail!("the review query must not be empty");
    }

    let pipeline = Arc::new(
        ReviewPipeline::new(working_dir, config, env, &identity)
            .with_invocation_dir(base_dir)
            .with_telemetry(telemetry),
    );
    let events = pipeline.stream(request);

    let result = TerminalReporter::new(args.debug).drain(events).await;
    if let Some(http) = &http_telemetry {
        http.flush().await;
    }

    match result {
        Some(Ok(_)) => Ok(()),
        Some(Err(err)) => Err(err.into()),
        None => bail!("review ended without a result"),
    }
}
