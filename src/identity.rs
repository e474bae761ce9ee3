//! Package identity, read once at startup.
//!
//! Forks rebuild the tool under a different package name (and optional
//! scope). The identity is constructed explicitly and passed to the pieces
//! that need it instead of being looked up globally.

use crate::constants::{APP_NAME, ENV_PACKAGE_NAME, ENV_PACKAGE_SCOPE, VERSION};
use crate::env::Env;

/// Immutable package identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub package_name: String,
    pub package_scope: Option<String>,
}

impl AppIdentity {
    /// Read the identity from the environment, falling back to the stock name.
    pub fn from_env(env: &Env) -> Self {
        Self {
            package_name: env
                .non_empty(ENV_PACKAGE_NAME)
                .unwrap_or_else(|| APP_NAME.to_string()),
            package_scope: env.non_empty(ENV_PACKAGE_SCOPE),
        }
    }

    /// `@scope/name` for scoped forks, `name` otherwise.
    pub fn full_name(&self) -> String {
        match &self.package_scope {
            Some(scope) => format!("{scope}/{}", self.package_name),
            None => self.package_name.clone(),
        }
    }

    /// Whether this build is a renamed fork.
    pub fn is_fork(&self) -> bool {
        self.package_name != APP_NAME
    }

    /// User agent for outgoing HTTP requests.
    pub fn user_agent(&self) -> String {
        format!("{}/{VERSION}", self.full_name())
    }
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self {
            package_name: APP_NAME.to_string(),
            package_scope: None,
        }
    }
}
