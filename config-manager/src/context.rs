use crate::config::{RolloutStrategy, ServerConfig};
use crate::errors::ConfigError;
use crate::token::TokenProvider;
use crate::types::RolloutId;
use parking_lot::RwLock;
use std::sync::Arc;

/// Process-wide state shared between the data plane and the configuration
/// manager. Service identity is fixed at construction; the observed rollout
/// id is written by the data plane on every check/report response and read
/// by the refresh loop.
pub struct GlobalContext {
    server_config: ServerConfig,
    service_name: String,
    bootstrap_config_id: Option<String>,
    observed_rollout_id: RwLock<Option<RolloutId>>,
    token_provider: Arc<dyn TokenProvider>,
}

impl GlobalContext {
    pub fn new(
        server_config: ServerConfig,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, ConfigError> {
        let service_name = server_config
            .service_name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::MissingServiceName)?;

        Ok(GlobalContext {
            bootstrap_config_id: server_config.service_config_id.clone(),
            service_name,
            server_config,
            observed_rollout_id: RwLock::new(None),
            token_provider,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn bootstrap_config_id(&self) -> Option<&str> {
        self.bootstrap_config_id.as_deref()
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.server_config
    }

    pub fn rollout_strategy(&self) -> RolloutStrategy {
        self.server_config.rollout_strategy
    }

    /// Rollout id last seen on a check/report response, or `None` before the
    /// first data-plane signal. Concurrent writes may overwrite each other;
    /// the refresh loop only needs some recently published value.
    pub fn rollout_id(&self) -> Option<RolloutId> {
        self.observed_rollout_id.read().clone()
    }

    pub fn set_rollout_id(&self, rollout_id: impl Into<RolloutId>) {
        *self.observed_rollout_id.write() = Some(rollout_id.into());
    }

    pub fn auth_token(&self) -> Option<String> {
        self.token_provider.auth_token()
    }
}
