use crate::config::{AuthConfig, RolloutStrategy, ServerConfig, ServiceManagementConfig};
use crate::context::GlobalContext;
use crate::token::{NoopTokenProvider, StaticTokenProvider};
use std::sync::Arc;

pub fn test_server_config(base_url: &str) -> ServerConfig {
    ServerConfig {
        service_name: Some("svc".to_string()),
        service_config_id: None,
        rollout_strategy: RolloutStrategy::Managed,
        service_management: ServiceManagementConfig {
            url: base_url.to_string(),
            refresh_interval_ms: 60_000,
        },
        auth: AuthConfig::default(),
    }
}

pub fn test_context(base_url: &str) -> Arc<GlobalContext> {
    Arc::new(
        GlobalContext::new(test_server_config(base_url), Arc::new(NoopTokenProvider))
            .expect("test context"),
    )
}

pub fn test_context_with_token(base_url: &str, token: &str) -> Arc<GlobalContext> {
    Arc::new(
        GlobalContext::new(
            test_server_config(base_url),
            Arc::new(StaticTokenProvider::new(token)),
        )
        .expect("test context"),
    )
}

pub fn test_context_with_interval(base_url: &str, refresh_interval_ms: u64) -> Arc<GlobalContext> {
    let mut config = test_server_config(base_url);
    config.service_management.refresh_interval_ms = refresh_interval_ms;
    Arc::new(GlobalContext::new(config, Arc::new(NoopTokenProvider)).expect("test context"))
}

/// Builds a rollouts response body by hand so the document order of the
/// percentages object is exactly the order of `percentages`.
pub fn rollouts_body(rollout_id: &str, percentages: &[(&str, u32)]) -> String {
    let entries = percentages
        .iter()
        .map(|(config_id, percent)| format!(r#""{config_id}": {percent}"#))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"{{
  "rollouts": [
    {{
      "rolloutId": "{rollout_id}",
      "createTime": "2024-03-18T22:40:09.884Z",
      "status": "SUCCESS",
      "trafficPercentStrategy": {{
        "percentages": {{{entries}}}
      }}
    }}
  ]
}}"#
    )
}
