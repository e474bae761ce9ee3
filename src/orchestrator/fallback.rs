//! Provider selection and failover.
//!
//! One review is driven through an explicit state machine:
//!
//! ```text
//! Start ──► SelectInitial ──► Invoke ──► Done
//!   │             │             │  ▲
//!   │             │             └──┘ (failure, next untried provider)
//!   └─────────────┴─────────────┴──► Failed
//! ```
//!
//! At most one provider call is in flight at a time and no provider is
//! invoked twice within one review.

use crate::config::Config;
use crate::constants::{DEFAULT_MAX_TOKENS, LARGE_CONTEXT_TOKENS};
use crate::error::{FailedAttempt, ReviewError};
use crate::models::{AssembledPrompt, InvocationOutcome, ProviderId, ReviewRequest, TaskRole};
use crate::progress::EventSink;
use crate::providers::registry::{self, ProviderRegistry};
use crate::providers::{ModelRequest, ProviderError, ProviderFactory};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Fallback states. Terminal states end the loop in [`FallbackExecutor::execute`].
#[derive(Debug)]
enum FallbackState {
    Start,
    /// `configured` is the config default, if it resolved to a known provider.
    SelectInitial { configured: Option<ProviderId> },
    /// `pinned` means an explicit override: one attempt, no failover.
    Invoke { provider: ProviderId, pinned: bool },
    Done(InvocationOutcome),
    Failed(ReviewError),
}

/// Runs the selection/invocation state machine for one prompt.
pub struct FallbackExecutor<'a> {
    registry: &'a ProviderRegistry,
    config: &'a Config,
    factory: &'a dyn ProviderFactory,
    telemetry: &'a dyn TelemetrySink,
    role: TaskRole,
}

/// Bookkeeping carried across states.
#[derive(Default)]
struct Attempts {
    tried: Vec<ProviderId>,
    failures: Vec<FailedAttempt>,
}

impl<'a> FallbackExecutor<'a> {
    pub fn new(
        registry: &'a ProviderRegistry,
        config: &'a Config,
        factory: &'a dyn ProviderFactory,
        telemetry: &'a dyn TelemetrySink,
        role: TaskRole,
    ) -> Self {
        Self {
            registry,
            config,
            factory,
            telemetry,
            role,
        }
    }

    /// Drive `prompt` to a response, failing over between providers.
    pub async fn execute(
        &self,
        request: &ReviewRequest,
        prompt: &AssembledPrompt,
        events: &EventSink,
    ) -> Result<InvocationOutcome, ReviewError> {
        if prompt.estimated_context_tokens > LARGE_CONTEXT_TOKENS {
            self.telemetry
                .annotate_token_count(prompt.estimated_context_tokens);
            events.warning(format!(
                "Warning: Context is very large (~{} tokens). The provider may reject or truncate it.",
                prompt.estimated_context_tokens
            ));
        }

        let mut attempts = Attempts::default();
        let mut state = FallbackState::Start;
        loop {
            state = match state {
                FallbackState::Done(outcome) => return Ok(outcome),
                FallbackState::Failed(err) => return Err(err),
                other => self.step(other, request, prompt, events, &mut attempts).await,
            };
        }
    }

    async fn step(
        &self,
        state: FallbackState,
        request: &ReviewRequest,
        prompt: &AssembledPrompt,
        events: &EventSink,
        attempts: &mut Attempts,
    ) -> FallbackState {
        match state {
            FallbackState::Start => self.start(request),
            FallbackState::SelectInitial { configured } => self.select_initial(configured),
            FallbackState::Invoke { provider, pinned } => {
                self.invoke(provider, pinned, request, prompt, events, attempts)
                    .await
            }
            terminal => terminal,
        }
    }

    fn start(&self, request: &ReviewRequest) -> FallbackState {
        let explicit = request
            .provider_override
            .as_deref()
            .filter(|name| !name.trim().is_empty());
        let configured = self
            .config
            .repo
            .provider
            .as_deref()
            .filter(|name| !name.trim().is_empty());
        let name = explicit.or(configured).unwrap_or(ProviderId::Gemini.as_str());

        let provider = match self.registry.lookup(name) {
            Ok(provider) => provider,
            Err(err) => return FallbackState::Failed(err),
        };

        if explicit.is_some() {
            if !self.registry.is_available(provider) {
                let available = self
                    .registry
                    .list_available()
                    .into_iter()
                    .map(|d| d.id)
                    .collect();
                return FallbackState::Failed(ReviewError::ProviderUnavailable {
                    provider,
                    available,
                });
            }
            return FallbackState::Invoke {
                provider,
                pinned: true,
            };
        }

        FallbackState::SelectInitial {
            configured: configured.map(|_| provider),
        }
    }

    fn select_initial(&self, configured: Option<ProviderId>) -> FallbackState {
        let initial = configured
            .filter(|p| self.registry.is_available(*p))
            .or_else(|| self.registry.next(self.role, None));
        match initial {
            Some(provider) => FallbackState::Invoke {
                provider,
                pinned: false,
            },
            None => FallbackState::Failed(ReviewError::NoProviderAvailable {
                credentials: self.registry.credential_vars(self.role),
            }),
        }
    }

    async fn invoke(
        &self,
        provider: ProviderId,
        pinned: bool,
        request: &ReviewRequest,
        prompt: &AssembledPrompt,
        events: &EventSink,
        attempts: &mut Attempts,
    ) -> FallbackState {
        attempts.tried.push(provider);

        let Some(model) = self.resolve_model(provider, request) else {
            return FallbackState::Failed(ReviewError::NoModel { provider });
        };
        let model_request = ModelRequest {
            model: model.clone(),
            max_tokens: self.resolve_max_tokens(provider, request),
            system_prompt: prompt.system_prompt.clone(),
            prompt: prompt.text.clone(),
            debug: request.debug,
        };

        tracing::info!(%provider, %model, "Trying provider");
        events.progress(format!("Reviewing changes using {model}..."));

        let result = match self.factory.create(provider) {
            Ok(client) => client.complete(&model_request).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(response) => {
                self.record_usage(provider, &model, response.usage);
                FallbackState::Done(InvocationOutcome {
                    provider,
                    model,
                    response_text: response.text,
                    prompt_tokens: response.usage.map(|u| u.prompt_tokens),
                    completion_tokens: response.usage.map(|u| u.completion_tokens),
                })
            }
            Err(source) if pinned => {
                tracing::warn!(%provider, error = %source, "pinned provider failed");
                FallbackState::Failed(ReviewError::PinnedProviderFailed { provider, source })
            }
            Err(error) => self.fail_over(provider, error, events, attempts),
        }
    }

    fn fail_over(
        &self,
        provider: ProviderId,
        error: ProviderError,
        events: &EventSink,
        attempts: &mut Attempts,
    ) -> FallbackState {
        tracing::warn!(%provider, error = %error, "Provider failed");
        events.progress(format!(
            "Provider {provider} failed, trying next available provider..."
        ));
        attempts.failures.push(FailedAttempt { provider, error });

        match self.next_untried(provider, &attempts.tried) {
            Some(next) => FallbackState::Invoke {
                provider: next,
                pinned: false,
            },
            None => FallbackState::Failed(ReviewError::AllProvidersFailed {
                attempts: std::mem::take(&mut attempts.failures),
            }),
        }
    }

    /// Next available provider after `current` that has not been tried yet.
    fn next_untried(&self, current: ProviderId, tried: &[ProviderId]) -> Option<ProviderId> {
        let mut cursor = current;
        while let Some(candidate) = self.registry.next(self.role, Some(cursor)) {
            if !tried.contains(&candidate) {
                return Some(candidate);
            }
            cursor = candidate;
        }
        None
    }

    fn resolve_model(&self, provider: ProviderId, request: &ReviewRequest) -> Option<String> {
        let provider_settings = self.config.provider(provider);
        [
            request.model_override.as_deref(),
            self.config.repo.model.as_deref(),
            provider_settings.and_then(|s| s.model.as_deref()),
            Some(registry::default_model(provider)),
        ]
        .into_iter()
        .flatten()
        .find(|model| !model.trim().is_empty())
        .map(str::to_string)
    }

    fn resolve_max_tokens(&self, provider: ProviderId, request: &ReviewRequest) -> u64 {
        request
            .max_tokens
            .or(self.config.repo.max_tokens)
            .or(self.config.provider(provider).and_then(|s| s.max_tokens))
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    fn record_usage(
        &self,
        provider: ProviderId,
        model: &str,
        usage: Option<crate::providers::TokenUsage>,
    ) {
        let event = match usage {
            Some(usage) => TelemetryEvent::TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                provider: provider.to_string(),
                model: model.to_string(),
            },
            None => {
                tracing::debug!(%provider, "provider reported no token usage");
                TelemetryEvent::Invocation {
                    provider: provider.to_string(),
                    model: model.to_string(),
                }
            }
        };
        self.telemetry.record(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use crate::env::Env;
    use crate::progress::{ReviewEvent, drain_ready};
    use crate::providers::{ModelProvider, ModelResponse, TokenUsage};
    use crate::telemetry::MemoryTelemetry;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every call; providers listed in `failing` return an error.
    #[derive(Default)]
    struct ScriptedFactory {
        failing: Vec<ProviderId>,
        broken: Vec<ProviderId>,
        usage: Option<TokenUsage>,
        calls: Arc<Mutex<Vec<(ProviderId, ModelRequest)>>>,
    }

    struct ScriptedProvider {
        id: ProviderId,
        fail: bool,
        usage: Option<TokenUsage>,
        calls: Arc<Mutex<Vec<(ProviderId, ModelRequest)>>>,
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
            self.calls.lock().unwrap().push((self.id, request.clone()));
            if self.fail {
                return Err(ProviderError::ApiError(format!("{} is down", self.id)));
            }
            Ok(ModelResponse {
                text: format!("review from {}", self.id),
                usage: self.usage,
            })
        }
    }

    impl ProviderFactory for ScriptedFactory {
        fn create(&self, id: ProviderId) -> Result<Box<dyn ModelProvider>, ProviderError> {
            if self.broken.contains(&id) {
                return Err(ProviderError::NotConfigured(format!("{id} client")));
            }
            Ok(Box::new(ScriptedProvider {
                id,
                fail: self.failing.contains(&id),
                usage: self.usage,
                calls: self.calls.clone(),
            }))
        }
    }

    impl ScriptedFactory {
        fn called(&self) -> Vec<ProviderId> {
            self.calls.lock().unwrap().iter().map(|(id, _)| *id).collect()
        }

        fn requests(&self) -> Vec<ModelRequest> {
            self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
        }
    }

    fn registry(keys: &[&'static str]) -> ProviderRegistry {
        ProviderRegistry::new(Env::mock(keys.iter().map(|k| (*k, "key"))))
    }

    fn prompt(tokens: usize) -> AssembledPrompt {
        AssembledPrompt {
            text: "prompt".into(),
            system_prompt: "system".into(),
            has_documents: false,
            estimated_context_tokens: tokens,
        }
    }

    struct Run {
        result: Result<InvocationOutcome, ReviewError>,
        events: Vec<ReviewEvent>,
    }

    async fn run(
        registry: &ProviderRegistry,
        config: &Config,
        factory: &ScriptedFactory,
        telemetry: &MemoryTelemetry,
        request: &ReviewRequest,
        tokens: usize,
    ) -> Run {
        let (sink, mut rx) = EventSink::channel();
        let executor = FallbackExecutor::new(registry, config, factory, telemetry, TaskRole::Repo);
        let result = executor.execute(request, &prompt(tokens), &sink).await;
        Run {
            result,
            events: drain_ready(&mut rx),
        }
    }

    fn progress_lines(events: &[ReviewEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                ReviewEvent::Progress(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn first_available_provider_answers() {
        let registry = registry(&["OPENAI_API_KEY", "ANTHROPIC_API_KEY"]);
        let factory = ScriptedFactory::default();
        let telemetry = MemoryTelemetry::default();
        let run = run(
            &registry,
            &Config::default(),
            &factory,
            &telemetry,
            &ReviewRequest::new("q"),
            10,
        )
        .await;

        let outcome = run.result.unwrap();
        assert_eq!(outcome.provider, ProviderId::OpenAI);
        assert_eq!(outcome.model, "gpt-4o");
        assert_eq!(outcome.response_text, "review from openai");
        assert_eq!(factory.called(), [ProviderId::OpenAI]);
        assert_eq!(progress_lines(&run.events), ["Reviewing changes using gpt-4o..."]);
        assert_eq!(
            telemetry.events(),
            [TelemetryEvent::Invocation {
                provider: "openai".into(),
                model: "gpt-4o".into()
            }]
        );
    }

    #[tokio::test]
    async fn failures_walk_the_preference_order() {
        let registry = registry(&["GEMINI_API_KEY", "OPENROUTER_API_KEY", "XAI_API_KEY"]);
        let factory = ScriptedFactory {
            failing: vec![ProviderId::Gemini, ProviderId::OpenRouter],
            usage: Some(TokenUsage {
                prompt_tokens: 120,
                completion_tokens: 30,
            }),
            ..Default::default()
        };
        let telemetry = MemoryTelemetry::default();
        let run = run(
            &registry,
            &Config::default(),
            &factory,
            &telemetry,
            &ReviewRequest::new("q"),
            10,
        )
        .await;

        let outcome = run.result.unwrap();
        assert_eq!(outcome.provider, ProviderId::XAI);
        assert_eq!(outcome.prompt_tokens, Some(120));
        assert_eq!(
            factory.called(),
            [ProviderId::Gemini, ProviderId::OpenRouter, ProviderId::XAI]
        );
        assert_eq!(
            progress_lines(&run.events),
            [
                "Reviewing changes using gemini-2.5-pro...",
                "Provider gemini failed, trying next available provider...",
                "Reviewing changes using google/gemini-2.5-pro...",
                "Provider openrouter failed, trying next available provider...",
                "Reviewing changes using grok-3-latest...",
            ]
        );
        assert_eq!(
            telemetry.events(),
            [TelemetryEvent::TokenUsage {
                prompt_tokens: 120,
                completion_tokens: 30,
                provider: "xai".into(),
                model: "grok-3-latest".into(),
            }]
        );
    }

    #[tokio::test]
    async fn exhausted_fallback_reports_every_attempt() {
        let registry = registry(&["GEMINI_API_KEY", "PERPLEXITY_API_KEY"]);
        let factory = ScriptedFactory {
            failing: vec![ProviderId::Gemini],
            broken: vec![ProviderId::Perplexity],
            ..Default::default()
        };
        let telemetry = MemoryTelemetry::default();
        let run = run(
            &registry,
            &Config::default(),
            &factory,
            &telemetry,
            &ReviewRequest::new("q"),
            10,
        )
        .await;

        match run.result.unwrap_err() {
            ReviewError::AllProvidersFailed { attempts } => {
                let ids: Vec<_> = attempts.iter().map(|a| a.provider).collect();
                assert_eq!(ids, [ProviderId::Gemini, ProviderId::Perplexity]);
                assert!(matches!(attempts[1].error, ProviderError::NotConfigured(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
        // The broken client was never called.
        assert_eq!(factory.called(), [ProviderId::Gemini]);
        assert!(telemetry.events().is_empty());
    }

    #[tokio::test]
    async fn unavailable_override_makes_no_call() {
        let registry = registry(&["GEMINI_API_KEY"]);
        let factory = ScriptedFactory::default();
        let telemetry = MemoryTelemetry::default();
        let request = ReviewRequest::new("q").with_provider("openai");
        let run = run(&registry, &Config::default(), &factory, &telemetry, &request, 10).await;

        match run.result.unwrap_err() {
            ReviewError::ProviderUnavailable {
                provider,
                available,
            } => {
                assert_eq!(provider, ProviderId::OpenAI);
                assert_eq!(available, [ProviderId::Gemini]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(factory.called().is_empty());
        assert!(run.events.is_empty());
    }

    #[tokio::test]
    async fn pinned_override_never_falls_back() {
        let registry = registry(&["GEMINI_API_KEY", "ANTHROPIC_API_KEY"]);
        let factory = ScriptedFactory {
            failing: vec![ProviderId::Anthropic],
            ..Default::default()
        };
        let telemetry = MemoryTelemetry::default();
        let request = ReviewRequest::new("q").with_provider("Anthropic");
        let run = run(&registry, &Config::default(), &factory, &telemetry, &request, 10).await;

        assert!(matches!(
            run.result.unwrap_err(),
            ReviewError::PinnedProviderFailed {
                provider: ProviderId::Anthropic,
                ..
            }
        ));
        assert_eq!(factory.called(), [ProviderId::Anthropic]);
    }

    #[tokio::test]
    async fn unknown_names_fail_before_any_call() {
        let registry = registry(&["GEMINI_API_KEY"]);
        let factory = ScriptedFactory::default();
        let telemetry = MemoryTelemetry::default();

        let request = ReviewRequest::new("q").with_provider("mistral");
        let run1 = run(&registry, &Config::default(), &factory, &telemetry, &request, 10).await;
        assert!(matches!(
            run1.result,
            Err(ReviewError::UnknownProvider { ref name }) if name == "mistral"
        ));

        let mut config = Config::default();
        config.repo.provider = Some("bogus".into());
        let run2 = run(
            &registry,
            &config,
            &factory,
            &telemetry,
            &ReviewRequest::new("q"),
            10,
        )
        .await;
        assert!(matches!(run2.result, Err(ReviewError::UnknownProvider { .. })));
        assert!(factory.called().is_empty());
    }

    #[tokio::test]
    async fn nothing_available_lists_credentials() {
        let registry = registry(&[]);
        let factory = ScriptedFactory::default();
        let telemetry = MemoryTelemetry::default();
        let run = run(
            &registry,
            &Config::default(),
            &factory,
            &telemetry,
            &ReviewRequest::new("q"),
            10,
        )
        .await;

        match run.result.unwrap_err() {
            ReviewError::NoProviderAvailable { credentials } => {
                assert_eq!(credentials[0], "GEMINI_API_KEY");
                assert_eq!(credentials[1], "MODELBOX_API_KEY");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(factory.called().is_empty());
    }

    #[tokio::test]
    async fn configured_default_is_tried_first_then_strictly_later_ones() {
        // Gemini sits before OpenAI in the repo order and is not tried.
        let registry = registry(&["GEMINI_API_KEY", "OPENAI_API_KEY", "XAI_API_KEY"]);
        let factory = ScriptedFactory {
            failing: vec![ProviderId::OpenAI, ProviderId::XAI],
            ..Default::default()
        };
        let mut config = Config::default();
        config.repo.provider = Some("openai".into());
        let telemetry = MemoryTelemetry::default();
        let run = run(&registry, &config, &factory, &telemetry, &ReviewRequest::new("q"), 10).await;

        assert!(matches!(run.result, Err(ReviewError::AllProvidersFailed { .. })));
        assert_eq!(factory.called(), [ProviderId::OpenAI, ProviderId::XAI]);
    }

    #[tokio::test]
    async fn unavailable_configured_default_uses_preference_order() {
        let registry = registry(&["MODELBOX_API_KEY"]);
        let factory = ScriptedFactory::default();
        let mut config = Config::default();
        config.repo.provider = Some("openai".into());
        let telemetry = MemoryTelemetry::default();
        let run = run(&registry, &config, &factory, &telemetry, &ReviewRequest::new("q"), 10).await;

        assert_eq!(run.result.unwrap().provider, ProviderId::ModelBox);
    }

    #[tokio::test]
    async fn model_and_token_resolution_order() {
        let registry = registry(&["GEMINI_API_KEY", "OPENAI_API_KEY"]);
        let factory = ScriptedFactory {
            failing: vec![ProviderId::Gemini],
            ..Default::default()
        };
        let mut config = Config::default();
        config.providers.insert(
            "openai".into(),
            ProviderSettings {
                model: Some("gpt-4.1".into()),
                max_tokens: Some(4000),
                base_url: None,
            },
        );
        let telemetry = MemoryTelemetry::default();
        let run = run(&registry, &config, &factory, &telemetry, &ReviewRequest::new("q"), 10).await;
        assert!(run.result.is_ok());

        let requests = factory.requests();
        assert_eq!(requests[0].model, "gemini-2.5-pro");
        assert_eq!(requests[0].max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(requests[1].model, "gpt-4.1");
        assert_eq!(requests[1].max_tokens, 4000);
        assert_eq!(requests[1].system_prompt, "system");
        assert_eq!(requests[1].prompt, "prompt");
    }

    #[tokio::test]
    async fn explicit_model_and_tokens_win() {
        let registry = registry(&["GEMINI_API_KEY"]);
        let factory = ScriptedFactory::default();
        let mut config = Config::default();
        config.repo.model = Some("repo-model".into());
        config.repo.max_tokens = Some(100);
        let telemetry = MemoryTelemetry::default();

        let run1 = run(
            &registry,
            &config,
            &factory,
            &telemetry,
            &ReviewRequest::new("q"),
            10,
        )
        .await;
        assert_eq!(run1.result.unwrap().model, "repo-model");

        let request = ReviewRequest::new("q").with_model("cli-model").with_max_tokens(50);
        let run2 = run(&registry, &config, &factory, &telemetry, &request, 10).await;
        assert_eq!(run2.result.unwrap().model, "cli-model");

        let requests = factory.requests();
        assert_eq!(requests[0].max_tokens, 100);
        assert_eq!(requests[1].max_tokens, 50);
    }

    #[tokio::test]
    async fn large_context_is_annotated_not_rejected() {
        let registry = registry(&["GEMINI_API_KEY"]);
        let factory = ScriptedFactory::default();
        let telemetry = MemoryTelemetry::default();
        let run = run(
            &registry,
            &Config::default(),
            &factory,
            &telemetry,
            &ReviewRequest::new("q"),
            250_000,
        )
        .await;

        assert!(run.result.is_ok());
        assert_eq!(telemetry.token_count(), Some(250_000));
        assert!(matches!(&run.events[0], ReviewEvent::Warning(s) if s.contains("250000")));
    }

    #[tokio::test]
    async fn budget_threshold_is_exclusive() {
        let registry = registry(&["GEMINI_API_KEY"]);
        let factory = ScriptedFactory::default();
        let telemetry = MemoryTelemetry::default();
        let run = run(
            &registry,
            &Config::default(),
            &factory,
            &telemetry,
            &ReviewRequest::new("q"),
            LARGE_CONTEXT_TOKENS,
        )
        .await;

        assert!(run.result.is_ok());
        assert_eq!(telemetry.token_count(), None);
    }
}
