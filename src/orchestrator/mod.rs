//! Review pipeline: context assembly followed by provider fallback.
//!
//! Stages run strictly in order: resolve the target directory, pack the
//! snapshot, collect the diff, fetch documents, assemble the prompt, then
//! hand off to the [`FallbackExecutor`]. Every stage reports through the
//! [`EventSink`] as it goes.

pub mod fallback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::diff::{DiffSource, GitCli, GitDiffCollector};
use crate::documents::{DocumentContextFetcher, DocumentFetcher, HttpDocumentFetcher};
use crate::env::Env;
use crate::error::ReviewError;
use crate::identity::AppIdentity;
use crate::models::{InvocationOutcome, ReviewRequest, TaskRole};
use crate::progress::{EventSink, ReviewEvent};
use crate::prompt;
use crate::providers::ProviderFactory;
use crate::providers::registry::ProviderRegistry;
use crate::providers::rig::RigProviderFactory;
use crate::snapshot::{IgnorePacker, PackOptions, RepoPacker, SnapshotBuilder};
use crate::telemetry::{NoopTelemetry, TelemetryEvent, TelemetrySink};

pub use fallback::FallbackExecutor;

/// Runs reviews against one working directory.
pub struct ReviewPipeline {
    working_dir: PathBuf,
    /// Where the user ran from; `--subdir` is relative to this.
    invocation_dir: PathBuf,
    config: Config,
    registry: ProviderRegistry,
    packer: Arc<dyn RepoPacker>,
    diff_source: Arc<dyn DiffSource>,
    documents: Arc<dyn DocumentFetcher>,
    factory: Arc<dyn ProviderFactory>,
    telemetry: Arc<dyn TelemetrySink>,
    role: TaskRole,
}

impl ReviewPipeline {
    /// A pipeline with the default collaborators: gitignore-aware packing,
    /// the `git` binary, HTTP document fetching and rig-core providers.
    pub fn new(
        working_dir: impl Into<PathBuf>,
        config: Config,
        env: Env,
        identity: &AppIdentity,
    ) -> Self {
        let working_dir = working_dir.into();
        let registry = ProviderRegistry::new(env);
        Self {
            diff_source: Arc::new(GitCli::new(working_dir.clone())),
            factory: Arc::new(RigProviderFactory::new(registry.clone(), config.clone())),
            documents: Arc::new(HttpDocumentFetcher::new(identity)),
            packer: Arc::new(IgnorePacker),
            telemetry: Arc::new(NoopTelemetry),
            role: TaskRole::default(),
            invocation_dir: working_dir.clone(),
            working_dir,
            config,
            registry,
        }
    }

    /// Resolve relative subdirectories against `dir` instead of the working
    /// root.
    pub fn with_invocation_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.invocation_dir = dir.into();
        self
    }

    pub fn with_packer(mut self, packer: Arc<dyn RepoPacker>) -> Self {
        self.packer = packer;
        self
    }

    pub fn with_diff_source(mut self, source: Arc<dyn DiffSource>) -> Self {
        self.diff_source = source;
        self
    }

    pub fn with_documents(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.documents = fetcher;
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_role(mut self, role: TaskRole) -> Self {
        self.role = role;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Run one review to completion.
    pub async fn run(
        &self,
        request: &ReviewRequest,
        events: &EventSink,
    ) -> Result<InvocationOutcome, ReviewError> {
        let target = self.target_directory(request)?;
        if let Some(subdir) = &request.subdirectory {
            events.progress(format!("Analyzing subdirectory: {}", subdir.display()));
        }

        events.progress("Packing repository...");
        let snapshot = SnapshotBuilder::new(
            self.packer.clone(),
            PackOptions::from_config(&self.working_dir, &self.config.snapshot),
        )
        .build(&target)
        .await?;
        if let Some(warning) = &snapshot.warning {
            events.warning(warning.as_str());
        }

        events.progress(format!("Computing changes from {}...", request.base_branch));
        let diff = GitDiffCollector::new(self.diff_source.as_ref())
            .diff(&request.base_branch)
            .await;
        if let Some(warning) = &diff.warning {
            events.warning(warning.as_str());
        }

        let documents = DocumentContextFetcher::new(self.documents.as_ref())
            .fetch_all(&request.document_urls, request.debug, events)
            .await;

        let prompt = prompt::assemble(
            &snapshot,
            &diff,
            &request.query,
            &request.base_branch,
            &documents,
        );
        tracing::debug!(
            tokens = prompt.estimated_context_tokens,
            has_documents = prompt.has_documents,
            "assembled prompt"
        );
        self.telemetry.record(TelemetryEvent::ContextSize {
            context_tokens: prompt.estimated_context_tokens,
        });

        FallbackExecutor::new(
            &self.registry,
            &self.config,
            self.factory.as_ref(),
            self.telemetry.as_ref(),
            self.role,
        )
        .execute(request, &prompt, events)
        .await
    }

    /// Run in the background and stream events.
    ///
    /// The stream always ends with exactly one [`ReviewEvent::Done`] or
    /// [`ReviewEvent::Failed`].
    pub fn stream(
        self: Arc<Self>,
        request: ReviewRequest,
    ) -> mpsc::UnboundedReceiver<ReviewEvent> {
        let (events, rx) = EventSink::channel();
        tokio::spawn(async move {
            let terminal = match self.run(&request, &events).await {
                Ok(outcome) => ReviewEvent::Done(outcome),
                Err(err) => ReviewEvent::Failed(err),
            };
            events.send(terminal);
        });
        rx
    }

    fn target_directory(&self, request: &ReviewRequest) -> Result<PathBuf, ReviewError> {
        let Some(subdir) = &request.subdirectory else {
            return Ok(self.working_dir.clone());
        };
        let target = self.invocation_dir.join(subdir);
        if !target.is_dir() {
            return Err(ReviewError::DirectoryNotFound { path: target });
        }
        Ok(target)
    }
}
