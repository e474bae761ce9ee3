//! Anonymous usage telemetry for review runs.
//!
//! The pipeline reports three kinds of events: the assembled context size,
//! the token usage of the answering provider, and (when usage is unknown)
//! just which provider and model answered. Sinks decide what to do with
//! them; recording never fails and never affects the review outcome.
//!
//! Telemetry is disabled with `--no-telemetry`, `REVDIFF_TELEMETRY=false`,
//! or `[telemetry] enabled = false` in config.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::constants::VERSION;
use crate::env::Env;
use crate::identity::AppIdentity;

/// Maximum time we'll wait for a POST before giving up.
const POST_TIMEOUT: Duration = Duration::from_secs(2);

/// One telemetry event. Serialises to the bare, camelCase field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TelemetryEvent {
    ContextSize {
        #[serde(rename = "contextTokens")]
        context_tokens: usize,
    },
    TokenUsage {
        #[serde(rename = "promptTokens")]
        prompt_tokens: u64,
        #[serde(rename = "completionTokens")]
        completion_tokens: u64,
        provider: String,
        model: String,
    },
    Invocation { provider: String, model: String },
}

/// Receiver for telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);

    /// Flag the current request as carrying a very large context.
    fn annotate_token_count(&self, _tokens: usize) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record(&self, _event: TelemetryEvent) {}
}

/// Keeps events in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
    token_count: Mutex<Option<usize>>,
}

impl MemoryTelemetry {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// The last annotated token count, if any.
    pub fn token_count(&self) -> Option<usize> {
        self.token_count.lock().ok().and_then(|count| *count)
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn record(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn annotate_token_count(&self, tokens: usize) {
        if let Ok(mut count) = self.token_count.lock() {
            *count = Some(tokens);
        }
    }
}

/// Writes events to the log at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn record(&self, event: TelemetryEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::debug!(target: "revdiff::telemetry", "{json}"),
            Err(e) => {
                tracing::debug!(target: "revdiff::telemetry", error = %e, "unserialisable event")
            }
        }
    }

    fn annotate_token_count(&self, tokens: usize) {
        tracing::debug!(target: "revdiff::telemetry", tokens, "large context");
    }
}

/// Envelope POSTed for each event.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryPayload {
    /// Random identifier for this single run (not persisted across runs).
    pub run_id: String,
    pub version: &'static str,
    /// Whether the run appears to be inside a CI environment.
    pub is_ci: bool,
    /// Package name, so forks can be told apart.
    pub package: String,
    /// Set once a large context has been annotated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
    #[serde(flatten)]
    pub event: TelemetryEvent,
}

/// JSON POSTs to a collector endpoint, one per event.
///
/// Must be used inside a tokio runtime. Errors are dropped. POSTs run in the
/// background; call [`HttpTelemetry::flush`] before the runtime shuts down.
pub struct HttpTelemetry {
    endpoint: String,
    run_id: String,
    is_ci: bool,
    package: String,
    token_count: Mutex<Option<usize>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpTelemetry {
    pub fn new(endpoint: impl Into<String>, identity: &AppIdentity, env: &Env) -> Self {
        Self {
            endpoint: endpoint.into(),
            run_id: uuid::Uuid::new_v4().to_string(),
            is_ci: detect_ci(env),
            package: identity.full_name(),
            token_count: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Wait for in-flight POSTs, giving up after the POST timeout.
    pub async fn flush(&self) {
        let handles = self
            .pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default();
        let all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(POST_TIMEOUT, all).await.is_err() {
            tracing::debug!("telemetry flush timed out");
        }
    }

    /// Build the envelope for one event.
    pub fn payload(&self, event: TelemetryEvent) -> TelemetryPayload {
        TelemetryPayload {
            run_id: self.run_id.clone(),
            version: VERSION,
            is_ci: self.is_ci,
            package: self.package.clone(),
            token_count: self.token_count.lock().ok().and_then(|count| *count),
            event,
        }
    }
}

impl TelemetrySink for HttpTelemetry {
    fn record(&self, event: TelemetryEvent) {
        let payload = self.payload(event);
        let endpoint = self.endpoint.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = post_event(&endpoint, &payload).await {
                tracing::debug!(error = %e, "telemetry post failed");
            }
        });
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
    }

    fn annotate_token_count(&self, tokens: usize) {
        if let Ok(mut count) = self.token_count.lock() {
            *count = Some(tokens);
        }
    }
}

/// Perform the HTTP POST. Separated for testability.
async fn post_event(endpoint: &str, payload: &TelemetryPayload) -> Result<(), reqwest::Error> {
    let client = reqwest::Client::builder().timeout(POST_TIMEOUT).build()?;
    client.post(endpoint).json(payload).send().await?;
    Ok(())
}

/// Detect whether we are running inside a CI environment by checking
/// common environment variables set by popular CI providers.
pub fn detect_ci(env: &Env) -> bool {
    const CI_VARS: &[&str] = &[
        "CI",
        "GITHUB_ACTIONS",
        "GITLAB_CI",
        "BITBUCKET_BUILD_NUMBER",
        "JENKINS_URL",
        "CIRCLECI",
        "TF_BUILD",           // Azure Pipelines
        "BUILDKITE",
        "TRAVIS",
        "CODEBUILD_BUILD_ID", // AWS CodeBuild
        "TEAMCITY_VERSION",
    ];
    CI_VARS.iter().any(|var| env.var(var).is_ok())
}
