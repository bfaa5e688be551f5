use serde::Deserialize;

pub const DEFAULT_SERVICE_MANAGEMENT_URL: &str = "https://servicemanagement.googleapis.com";

const DEFAULT_REFRESH_INTERVAL_MS: u64 = 60_000;

/// Options recognized by the configuration manager, usually one section of
/// the sidecar's config file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Name of the managed service. Required for the managed rollout
    /// strategy; host-metadata discovery is the embedding proxy's concern.
    pub service_name: Option<String>,
    /// Config id to pin when `rollout_strategy` is `fixed`.
    pub service_config_id: Option<String>,
    #[serde(default)]
    pub rollout_strategy: RolloutStrategy,
    #[serde(default)]
    pub service_management: ServiceManagementConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RolloutStrategy {
    /// Track remote rollouts and republish on change.
    #[default]
    Managed,
    /// Pin the bootstrap config id; the refresh loop stays off.
    Fixed,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceManagementConfig {
    pub url: String,
    pub refresh_interval_ms: u64,
}

impl Default for ServiceManagementConfig {
    fn default() -> Self {
        ServiceManagementConfig {
            url: DEFAULT_SERVICE_MANAGEMENT_URL.to_string(),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

/// Where the bearer token for service-management requests comes from.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct AuthConfig {
    pub token: Option<String>,
    /// Environment variable read on every request, so a rotated token is
    /// picked up without a restart.
    pub token_env: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_applies_defaults() {
        let yaml = r#"
            service_name: bookstore.endpoints.test
        "#;
        let config: ServerConfig = serde_yaml::from_str(yaml).expect("parse config");

        assert_eq!(
            config.service_name.as_deref(),
            Some("bookstore.endpoints.test")
        );
        assert_eq!(config.rollout_strategy, RolloutStrategy::Managed);
        assert_eq!(config.service_management.url, DEFAULT_SERVICE_MANAGEMENT_URL);
        assert_eq!(config.service_management.refresh_interval_ms, 60_000);
        assert_eq!(config.auth, AuthConfig::default());
    }

    #[test]
    fn full_config_overrides_defaults() {
        let yaml = r#"
            service_name: bookstore.endpoints.test
            service_config_id: 2024-03-18r0
            rollout_strategy: fixed
            service_management:
                url: http://127.0.0.1:9000
                refresh_interval_ms: 5000
            auth:
                token_env: SERVICE_MANAGEMENT_TOKEN
        "#;
        let config: ServerConfig = serde_yaml::from_str(yaml).expect("parse config");

        assert_eq!(config.service_config_id.as_deref(), Some("2024-03-18r0"));
        assert_eq!(config.rollout_strategy, RolloutStrategy::Fixed);
        assert_eq!(config.service_management.url, "http://127.0.0.1:9000");
        assert_eq!(config.service_management.refresh_interval_ms, 5000);
        assert_eq!(
            config.auth.token_env.as_deref(),
            Some("SERVICE_MANAGEMENT_TOKEN")
        );
    }
}
