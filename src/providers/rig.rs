//! rig-core integration for LLM-backed reviews.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support: Gemini, OpenAI, OpenRouter, Perplexity, Anthropic and xAI
//! natively, ModelBox through the OpenAI-compatible client.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::Config;
use crate::constants::MODELBOX_BASE_URL;
use crate::models::ProviderId;

use super::registry::ProviderRegistry;
use super::{ModelProvider, ModelRequest, ModelResponse, ProviderError, ProviderFactory, TokenUsage};

/// Build an agent from a rig-core client, prompt it, and keep the usage.
///
/// Always sets `max_tokens`. Without it some providers (e.g. Gemini) fall back
/// to a low default limit that truncates responses.
macro_rules! prompt_text {
    ($client:expr, $request:expr, $label:expr) => {{
        let agent = $client
            .agent($request.model.as_str())
            .preamble($request.system_prompt.as_str())
            .max_tokens($request.max_tokens)
            .build();
        agent
            .prompt($request.prompt.as_str())
            .extended_details()
            .await
            .map(|response| ModelResponse {
                usage: reported_usage(&response.usage),
                text: response.output,
            })
            .map_err(|e| ProviderError::ApiError(format!("{} API error: {e}", $label)))
    }};
}

/// Providers that report nothing leave rig's usage zeroed.
fn reported_usage(usage: &rig::completion::Usage) -> Option<TokenUsage> {
    if usage.input_tokens == 0 && usage.output_tokens == 0 {
        return None;
    }
    Some(TokenUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
    })
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            ProviderError::ApiError(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based model provider for one [`ProviderId`].
pub struct RigProvider {
    provider: ProviderId,
    api_key: String,
    base_url: Option<String>,
}

impl RigProvider {
    /// Create a provider with an explicit key and optional endpoint override.
    pub fn new(
        provider: ProviderId,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no API key found for provider '{provider}'. Set {}.",
                super::registry::credentials(provider).join(", ")
            ))
        })?;
        Ok(Self {
            provider,
            api_key,
            base_url,
        })
    }

    /// Endpoint override, if any.
    pub(crate) fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Build an OpenAI-style client against `base_url` (or the default endpoint).
    fn build_openai_client(
        &self,
        base_url: Option<&str>,
        label: &str,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(&self.api_key);
        if let Some(base_url) = base_url {
            builder = builder.base_url(base_url);
        }
        let client: providers::openai::CompletionsClient = builder
            .build()
            .map_err(|e| ProviderError::ApiError(format!("failed to create {label} client: {e}")))?;
        Ok(client)
    }
}

#[async_trait]
impl ModelProvider for RigProvider {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let api_key = self.api_key.as_str();

        if request.debug {
            tracing::debug!(
                provider = %self.provider,
                model = %request.model,
                prompt_chars = request.prompt.len(),
                max_tokens = request.max_tokens,
                "sending completion request"
            );
        }

        match self.provider {
            ProviderId::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_text!(client, request, "Gemini")
            }
            ProviderId::OpenAI => {
                let client = self.build_openai_client(self.base_url.as_deref(), "OpenAI")?;
                prompt_text!(client, request, "OpenAI")
            }
            ProviderId::OpenRouter => {
                let client = new_client!(providers::openrouter::Client, api_key, "OpenRouter")?;
                prompt_text!(client, request, "OpenRouter")
            }
            ProviderId::Perplexity => {
                let client = new_client!(providers::perplexity::Client, api_key, "Perplexity")?;
                prompt_text!(client, request, "Perplexity")
            }
            ProviderId::ModelBox => {
                let base_url = self.base_url.as_deref().unwrap_or(MODELBOX_BASE_URL);
                let client = self.build_openai_client(Some(base_url), "ModelBox")?;
                prompt_text!(client, request, "ModelBox")
            }
            ProviderId::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::ApiError(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_text!(client, request, "Anthropic")
            }
            ProviderId::XAI => {
                let client = new_client!(providers::xai::Client, api_key, "xAI")?;
                prompt_text!(client, request, "xAI")
            }
        }
    }
}

/// Creates [`RigProvider`]s with keys from the registry and endpoints from config.
pub struct RigProviderFactory {
    registry: ProviderRegistry,
    config: Config,
}

impl RigProviderFactory {
    pub fn new(registry: ProviderRegistry, config: Config) -> Self {
        Self { registry, config }
    }

    /// Configured endpoint for `provider`. ModelBox always has one.
    fn endpoint(&self, provider: ProviderId) -> Option<String> {
        let configured = self
            .config
            .provider(provider)
            .and_then(|settings| settings.base_url.clone())
            .filter(|url| !url.trim().is_empty());
        match provider {
            ProviderId::ModelBox => configured.or_else(|| Some(MODELBOX_BASE_URL.to_string())),
            _ => configured,
        }
    }

    fn build(&self, provider: ProviderId) -> Result<RigProvider, ProviderError> {
        RigProvider::new(
            provider,
            self.registry.api_key(provider),
            self.endpoint(provider),
        )
    }
}

impl ProviderFactory for RigProviderFactory {
    fn create(&self, provider: ProviderId) -> Result<Box<dyn ModelProvider>, ProviderError> {
        Ok(Box::new(self.build(provider)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;

    #[test]
    fn new_provider_missing_api_key() {
        let result = RigProvider::new(ProviderId::Gemini, None, None);
        match result {
            Err(e) => {
                let msg = e.to_string();
                assert!(msg.contains("API key"), "got: {msg}");
                assert!(msg.contains("GEMINI_API_KEY"), "got: {msg}");
            }
            Ok(_) => panic!("expected error for missing API key"),
        }
    }

    #[test]
    fn new_provider_with_api_key() {
        assert!(RigProvider::new(ProviderId::Anthropic, Some("sk-test".into()), None).is_ok());
    }

    #[test]
    fn factory_reads_key_from_registry() {
        let registry = ProviderRegistry::new(Env::mock([("XAI_API_KEY", "xai-key")]));
        let factory = RigProviderFactory::new(registry, Config::default());
        assert!(factory.create(ProviderId::XAI).is_ok());
        assert!(matches!(
            factory.create(ProviderId::OpenAI),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    fn config_with_base_url(provider: &str, url: &str) -> Config {
        let mut config = Config::default();
        config.providers.insert(
            provider.to_string(),
            crate::config::ProviderSettings {
                base_url: Some(url.into()),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn factory_passes_configured_base_url() {
        let registry = ProviderRegistry::new(Env::mock([("OPENAI_API_KEY", "k")]));
        let config = config_with_base_url("openai", "https://proxy.example/v1");
        let factory = RigProviderFactory::new(registry.clone(), config);
        assert!(factory.create(ProviderId::OpenAI).is_ok());
        let provider = factory.build(ProviderId::OpenAI).unwrap();
        assert_eq!(provider.base_url(), Some("https://proxy.example/v1"));

        let plain = RigProviderFactory::new(registry, Config::default());
        assert_eq!(plain.build(ProviderId::OpenAI).unwrap().base_url(), None);
    }

    #[test]
    fn modelbox_endpoint_defaults_and_can_be_overridden() {
        let registry = ProviderRegistry::new(Env::mock([("MODELBOX_API_KEY", "k")]));
        let factory = RigProviderFactory::new(registry.clone(), Config::default());
        let provider = factory.build(ProviderId::ModelBox).unwrap();
        assert_eq!(provider.base_url(), Some(MODELBOX_BASE_URL));

        let config = config_with_base_url("modelbox", "https://mb.internal/v1");
        let factory = RigProviderFactory::new(registry, config);
        let provider = factory.build(ProviderId::ModelBox).unwrap();
        assert_eq!(provider.base_url(), Some("https://mb.internal/v1"));
    }

    #[test]
    fn zero_usage_is_reported_as_unknown() {
        let mut usage = rig::completion::Usage::new();
        assert_eq!(reported_usage(&usage), None);

        usage.input_tokens = 120;
        usage.output_tokens = 30;
        assert_eq!(
            reported_usage(&usage),
            Some(TokenUsage {
                prompt_tokens: 120,
                completion_tokens: 30,
            })
        );
    }
}
