//! Provider availability registry.
//!
//! A static table maps every [`ProviderId`] to the credentials it needs and
//! its built-in default model. Availability is computed from the
//! environment on every call and never cached, so a key exported between
//! two runs is picked up immediately.

use serde::Serialize;

use crate::env::Env;
use crate::error::ReviewError;
use crate::models::{ProviderId, TaskRole};

/// Static metadata for one provider.
struct ProviderSpec {
    id: ProviderId,
    credentials: &'static [&'static str],
    default_model: &'static str,
}

/// Provider table, in display order.
const PROVIDERS: [ProviderSpec; 7] = [
    ProviderSpec {
        id: ProviderId::Gemini,
        credentials: &["GEMINI_API_KEY"],
        default_model: "gemini-2.5-pro",
    },
    ProviderSpec {
        id: ProviderId::OpenAI,
        credentials: &["OPENAI_API_KEY"],
        default_model: "gpt-4o",
    },
    ProviderSpec {
        id: ProviderId::OpenRouter,
        credentials: &["OPENROUTER_API_KEY"],
        default_model: "google/gemini-2.5-pro",
    },
    ProviderSpec {
        id: ProviderId::Perplexity,
        credentials: &["PERPLEXITY_API_KEY"],
        default_model: "sonar-pro",
    },
    ProviderSpec {
        id: ProviderId::ModelBox,
        credentials: &["MODELBOX_API_KEY"],
        default_model: "google/gemini-2.5-pro",
    },
    ProviderSpec {
        id: ProviderId::Anthropic,
        credentials: &["ANTHROPIC_API_KEY"],
        default_model: "claude-sonnet-4-20250514",
    },
    ProviderSpec {
        id: ProviderId::XAI,
        credentials: &["XAI_API_KEY"],
        default_model: "grok-3-latest",
    },
];

/// Fallback preference order for a task role.
pub fn preference_order(role: TaskRole) -> &'static [ProviderId] {
    use ProviderId::*;
    match role {
        TaskRole::Repo => &[Gemini, ModelBox, OpenRouter, OpenAI, Perplexity, Anthropic, XAI],
        TaskRole::Doc => &[Gemini, Anthropic, OpenAI, OpenRouter, ModelBox, Perplexity, XAI],
    }
}

fn spec(id: ProviderId) -> &'static ProviderSpec {
    // The table covers every variant; the match keeps that exhaustive.
    let index = match id {
        ProviderId::Gemini => 0,
        ProviderId::OpenAI => 1,
        ProviderId::OpenRouter => 2,
        ProviderId::Perplexity => 3,
        ProviderId::ModelBox => 4,
        ProviderId::Anthropic => 5,
        ProviderId::XAI => 6,
    };
    let spec = &PROVIDERS[index];
    debug_assert_eq!(spec.id, id);
    spec
}

/// Environment variables that must all be set for `id` to be usable.
pub fn credentials(id: ProviderId) -> &'static [&'static str] {
    spec(id).credentials
}

/// Built-in model used when nothing else is configured.
pub fn default_model(id: ProviderId) -> &'static str {
    spec(id).default_model
}

/// Snapshot of one provider's state at lookup time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub default_model: &'static str,
    pub is_available: bool,
}

/// Answers "which providers exist and which can I use right now".
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    env: Env,
}

impl ProviderRegistry {
    pub fn new(env: Env) -> Self {
        Self { env }
    }

    /// Resolve a user-supplied provider name.
    ///
    /// Unknown names are a configuration error, distinct from a known
    /// provider that merely lacks credentials.
    pub fn lookup(&self, name: &str) -> Result<ProviderId, ReviewError> {
        name.parse().map_err(|_| ReviewError::UnknownProvider {
            name: name.trim().to_string(),
        })
    }

    /// All required credentials are present and non-empty.
    pub fn is_available(&self, id: ProviderId) -> bool {
        credentials(id).iter().all(|var| self.env.is_set(var))
    }

    pub fn descriptor(&self, id: ProviderId) -> ProviderDescriptor {
        ProviderDescriptor {
            id,
            default_model: default_model(id),
            is_available: self.is_available(id),
        }
    }

    /// Every provider with its current availability.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        ProviderId::ALL.into_iter().map(|id| self.descriptor(id)).collect()
    }

    /// Usable providers, in table order.
    pub fn list_available(&self) -> Vec<ProviderDescriptor> {
        self.descriptors()
            .into_iter()
            .filter(|d| d.is_available)
            .collect()
    }

    /// First available provider strictly after `excluding` in the role's order.
    ///
    /// Starts from the beginning when `excluding` is `None` or not part of
    /// the order.
    pub fn next(&self, role: TaskRole, excluding: Option<ProviderId>) -> Option<ProviderId> {
        let order = preference_order(role);
        let start = excluding
            .and_then(|ex| order.iter().position(|&p| p == ex))
            .map_or(0, |pos| pos + 1);
        order[start..]
            .iter()
            .copied()
            .find(|&p| self.is_available(p))
    }

    /// API key for a provider (its first credential variable).
    pub fn api_key(&self, id: ProviderId) -> Option<String> {
        credentials(id)
            .first()
            .and_then(|var| self.env.non_empty(var))
    }

    /// Credential variables for a role, in preference order, for error messages.
    pub fn credential_vars(&self, role: TaskRole) -> Vec<&'static str> {
        let mut vars = Vec::new();
        for &id in preference_order(role) {
            for &var in credentials(id) {
                if !vars.contains(&var) {
                    vars.push(var);
                }
            }
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(vars: &[(&str, &str)]) -> ProviderRegistry {
        ProviderRegistry::new(Env::mock(vars.iter().copied()))
    }

    #[test]
    fn table_covers_every_provider() {
        for id in ProviderId::ALL {
            assert_eq!(spec(id).id, id);
            assert!(!default_model(id).is_empty());
            assert!(!credentials(id).is_empty());
        }
    }

    #[test]
    fn preference_orders_contain_each_provider_once() {
        for role in [TaskRole::Repo, TaskRole::Doc] {
            let order = preference_order(role);
            assert_eq!(order.len(), ProviderId::ALL.len());
            for id in ProviderId::ALL {
                assert_eq!(order.iter().filter(|&&p| p == id).count(), 1);
            }
        }
    }

    #[test]
    fn availability_requires_non_empty_key() {
        let reg = registry(&[("OPENAI_API_KEY", "sk-1"), ("GEMINI_API_KEY", "")]);
        assert!(reg.is_available(ProviderId::OpenAI));
        assert!(!reg.is_available(ProviderId::Gemini));
        assert!(!reg.is_available(ProviderId::Anthropic));
    }

    #[test]
    fn list_available_in_table_order() {
        let reg = registry(&[("XAI_API_KEY", "x"), ("GEMINI_API_KEY", "g")]);
        let ids: Vec<_> = reg.list_available().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![ProviderId::Gemini, ProviderId::XAI]);
    }

    #[test]
    fn next_walks_preference_order() {
        let reg = registry(&[
            ("OPENAI_API_KEY", "o"),
            ("OPENROUTER_API_KEY", "r"),
            ("ANTHROPIC_API_KEY", "a"),
        ]);
        let role = TaskRole::Repo;
        assert_eq!(reg.next(role, None), Some(ProviderId::OpenRouter));
        assert_eq!(reg.next(role, Some(ProviderId::OpenRouter)), Some(ProviderId::OpenAI));
        assert_eq!(reg.next(role, Some(ProviderId::OpenAI)), Some(ProviderId::Anthropic));
        assert_eq!(reg.next(role, Some(ProviderId::Anthropic)), None);
    }

    #[test]
    fn next_excluding_unavailable_provider_continues_after_it() {
        let reg = registry(&[("GEMINI_API_KEY", "g"), ("PERPLEXITY_API_KEY", "p")]);
        // ModelBox is not available but still anchors the walk.
        assert_eq!(
            reg.next(TaskRole::Repo, Some(ProviderId::ModelBox)),
            Some(ProviderId::Perplexity)
        );
    }

    #[test]
    fn next_with_nothing_available() {
        let reg = registry(&[]);
        assert_eq!(reg.next(TaskRole::Repo, None), None);
    }

    #[test]
    fn doc_role_uses_its_own_order() {
        let reg = registry(&[("ANTHROPIC_API_KEY", "a"), ("OPENAI_API_KEY", "o")]);
        assert_eq!(reg.next(TaskRole::Doc, None), Some(ProviderId::Anthropic));
        assert_eq!(reg.next(TaskRole::Repo, None), Some(ProviderId::OpenAI));
    }

    #[test]
    fn lookup_distinguishes_unknown_from_unavailable() {
        let reg = registry(&[]);
        assert_eq!(reg.lookup("OpenAI").unwrap(), ProviderId::OpenAI);
        assert!(!reg.is_available(ProviderId::OpenAI));

        let err = reg.lookup("gpt").unwrap_err();
        assert!(matches!(err, ReviewError::UnknownProvider { ref name } if name == "gpt"));
    }

    #[test]
    fn api_key_reads_first_credential() {
        let reg = registry(&[("MODELBOX_API_KEY", "mb-key")]);
        assert_eq!(reg.api_key(ProviderId::ModelBox).as_deref(), Some("mb-key"));
        assert_eq!(reg.api_key(ProviderId::Gemini), None);
    }

    #[test]
    fn credential_vars_follow_role_order() {
        let reg = registry(&[]);
        let vars = reg.credential_vars(TaskRole::Repo);
        assert_eq!(vars.first(), Some(&"GEMINI_API_KEY"));
        assert_eq!(vars[1], "MODELBOX_API_KEY");
        assert_eq!(vars.len(), 7);
    }
}
