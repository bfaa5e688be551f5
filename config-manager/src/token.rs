use crate::config::AuthConfig;
use std::sync::Arc;

/// Supplies the bearer token attached to service-management requests.
///
/// Token acquisition and refresh belong to the embedding proxy; the manager
/// only asks for the current value right before each request.
pub trait TokenProvider: Send + Sync {
    fn auth_token(&self) -> Option<String>;
}

/// Requests are sent without an Authorization header.
pub struct NoopTokenProvider;

impl TokenProvider for NoopTokenProvider {
    fn auth_token(&self) -> Option<String> {
        None
    }
}

pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        StaticTokenProvider {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn auth_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

/// Reads the token from a process environment variable on every call.
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        EnvTokenProvider { var: var.into() }
    }
}

impl TokenProvider for EnvTokenProvider {
    fn auth_token(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|t| !t.is_empty())
    }
}

pub fn from_config(auth: &AuthConfig) -> Arc<dyn TokenProvider> {
    if let Some(token) = &auth.token {
        return Arc::new(StaticTokenProvider::new(token.clone()));
    }
    if let Some(var) = &auth.token_env {
        return Arc::new(EnvTokenProvider::new(var.clone()));
    }
    tracing::warn!("no auth token configured, service management requests will be unauthenticated");
    Arc::new(NoopTokenProvider)
}
